//! Example: TCP echo server on a single reactor
//!
//! One read handler serves the listener and every client; it tells them
//! apart through the descriptor it is handed.

use std::cell::RefCell;
use std::collections::HashMap;
use std::io::{ErrorKind, Read, Write};
use std::net::{TcpListener, TcpStream};
use std::os::fd::{AsRawFd, RawFd};
use std::rc::Rc;
use std::time::Duration;

use tracing::info;
use tracing_subscriber::EnvFilter;
use vigil::{Mode, Reactor, Termination, TimerAction};

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let listener = TcpListener::bind("127.0.0.1:9000").unwrap();
    listener.set_nonblocking(true).unwrap();
    let listen_fd = listener.as_raw_fd();
    info!("echo server listening on 127.0.0.1:9000");

    let mut reactor = Reactor::builder()
        .termination(Termination::TimersOrDescriptors)
        .build();
    reactor.add_descriptor(listen_fd, Mode::Read).unwrap();

    let clients: Rc<Clients> = Rc::default();

    let stats = clients.clone();
    reactor
        .add_timer(Duration::from_secs(5), move |_| {
            info!(clients = stats.borrow().len(), "still serving");
            TimerAction::Keep
        })
        .unwrap();

    reactor.on_read(move |r, fd| {
        if fd == listen_fd {
            accept_all(r, &listener, &clients);
        } else {
            echo(r, fd, &clients);
        }
    });

    reactor.run();
}

type Clients = RefCell<HashMap<RawFd, TcpStream>>;

fn accept_all(reactor: &mut Reactor, listener: &TcpListener, clients: &Clients) {
    loop {
        match listener.accept() {
            Ok((stream, addr)) => {
                if stream.set_nonblocking(true).is_err() {
                    continue;
                }
                let fd = stream.as_raw_fd();
                if let Err(e) = reactor.add_descriptor(fd, Mode::Read) {
                    info!(%addr, error = %e, "refusing connection");
                    continue;
                }
                info!(%addr, fd, "accepted connection");
                clients.borrow_mut().insert(fd, stream);
            }
            Err(e) if e.kind() == ErrorKind::WouldBlock => break,
            Err(e) => {
                info!(error = %e, "accept failed");
                break;
            }
        }
    }
}

fn echo(reactor: &mut Reactor, fd: RawFd, clients: &Clients) {
    let mut closed = false;
    {
        let mut clients = clients.borrow_mut();
        let Some(stream) = clients.get_mut(&fd) else {
            return;
        };

        // Edge-triggered backends only report new data once.
        let mut buf = [0u8; 1024];
        loop {
            match stream.read(&mut buf) {
                Ok(0) => {
                    closed = true;
                    break;
                }
                Ok(n) => {
                    if stream.write_all(&buf[..n]).is_err() {
                        closed = true;
                        break;
                    }
                }
                Err(e) if e.kind() == ErrorKind::WouldBlock => break,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(_) => {
                    closed = true;
                    break;
                }
            }
        }
    }

    if closed {
        let _ = reactor.remove_descriptor(fd);
        clients.borrow_mut().remove(&fd);
        info!(fd, "connection closed");
    }
}
