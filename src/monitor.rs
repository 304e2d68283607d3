use crate::provision::GroupSocket;

use mio::{Events, Interest, Poll, Token, Waker};

use std::io::ErrorKind;
use std::os::fd::RawFd;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::SystemTime;

/// Size of the single read buffer shared by every socket. One datagram is
/// read per readiness event; a read that fills this exactly is flagged as
/// possibly truncated.
pub const READ_BUFFER_SIZE: usize = 256 * 1024;

const EVENTS_SIZE: usize = 128;
const WAKER_TOKEN: Token = Token(0);

/// What the poll loop observed on one iteration.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum MonitorEvent {
    /// One datagram was read. `saturated` means the read filled the whole
    /// buffer, so more data may have been left unconsumed.
    Datagram { fd: RawFd, len: usize, saturated: bool, timestamp: SystemTime },

    /// The OS flagged an error condition on the socket. Not fatal.
    SocketError { fd: RawFd },

    /// The OS flagged a hang-up condition on the socket. Not fatal.
    SocketClosed { fd: RawFd },
}

/// Cancellation token for [`Monitor::run`]: sets the shutdown flag and wakes
/// the blocking wait so the flag is seen at once. Made for an interrupt
/// handler, usable from any thread.
#[derive(Clone)]
pub struct ShutdownHandle {
    flag: Arc<AtomicBool>,
    waker: Arc<Waker>,
}

impl ShutdownHandle {
    pub fn shutdown(&self) {
        self.flag.store(true, Ordering::Relaxed);
        if let Err(err) = self.waker.wake() {
            log::error!("Unable to wake the poll for shutdown: {}", err);
        }
    }
}

/// Single-threaded readiness multiplexing over the whole socket set.
///
/// Steady state is [`Monitor::run`]; it only leaves on shutdown or on a
/// fatal wait error. [`Monitor::close`] then drains the set, closing every
/// socket exactly once.
pub struct Monitor {
    poll: Poll,
    events: Events,
    sockets: Vec<GroupSocket>,
    buffer: Vec<u8>,
    shutdown: Arc<AtomicBool>,
    waker: Arc<Waker>,
}

impl Monitor {
    /// Registers every socket for read readiness. Interest never changes
    /// afterwards.
    pub fn new(mut sockets: Vec<GroupSocket>) -> std::io::Result<Self> {
        let poll = Poll::new()?;
        let waker = Arc::new(Waker::new(poll.registry(), WAKER_TOKEN)?);

        #[cfg(target_os = "linux")]
        let interest = Interest::READABLE | Interest::PRIORITY;
        #[cfg(not(target_os = "linux"))]
        let interest = Interest::READABLE;

        for (index, group) in sockets.iter_mut().enumerate() {
            poll.registry().register(group.socket_mut(), Token(index + 1), interest)?;
        }

        Ok(Self {
            poll,
            events: Events::with_capacity(EVENTS_SIZE),
            sockets,
            buffer: vec![0; READ_BUFFER_SIZE],
            shutdown: Arc::new(AtomicBool::new(false)),
            waker,
        })
    }

    pub fn shutdown_handle(&self) -> ShutdownHandle {
        ShutdownHandle { flag: self.shutdown.clone(), waker: self.waker.clone() }
    }

    /// Blocks until shutdown is requested or the wait itself fails fatally.
    ///
    /// Per readable socket, exactly one bounded read is performed before
    /// moving to the next; on datagram sockets one readiness event matches
    /// one pending datagram. Signal interruption of the wait just re-enters
    /// the loop. The shutdown flag is checked once per iteration.
    pub fn run(&mut self, mut on_event: impl FnMut(MonitorEvent)) {
        log::trace!("Polling {} sockets", self.sockets.len());
        loop {
            match self.poll.poll(&mut self.events, None) {
                Ok(()) => {
                    if self.events.is_empty() {
                        log::warn!("Wakeup without ready sockets on an untimed wait");
                    }
                    for event in self.events.iter() {
                        if event.token() == WAKER_TOKEN {
                            log::trace!("Shutdown waker fired");
                            continue
                        }

                        let index = event.token().0 - 1;
                        let fd = self.sockets[index].raw_fd();

                        if event.is_error() {
                            on_event(MonitorEvent::SocketError { fd });
                        }
                        if event.is_read_closed() {
                            on_event(MonitorEvent::SocketClosed { fd });
                        }

                        if event.is_readable() || event.is_priority() {
                            match self.sockets[index].socket().recv(&mut self.buffer) {
                                Ok(len) => {
                                    let timestamp = SystemTime::now();
                                    on_event(MonitorEvent::Datagram {
                                        fd,
                                        len,
                                        saturated: len == READ_BUFFER_SIZE,
                                        timestamp,
                                    });
                                }
                                Err(ref err) if err.kind() == ErrorKind::WouldBlock => {
                                    log::trace!("No pending datagram on socket {}", fd);
                                }
                                Err(err) => {
                                    log::error!("Receive error on socket {}: {}", fd, err);
                                }
                            }
                        }
                    }
                }
                Err(ref err) if err.kind() == ErrorKind::Interrupted => {
                    log::trace!("Poll interrupted by signal");
                }
                Err(err) => {
                    log::error!("Error polling sockets: {}", err);
                    break
                }
            }

            if self.shutdown.load(Ordering::Relaxed) {
                break
            }
        }
        log::trace!("Polling finished");
    }

    /// Closes every socket, in provisioning order.
    pub fn close(mut self) {
        for mut group in self.sockets.drain(..) {
            if let Err(err) = self.poll.registry().deregister(group.socket_mut()) {
                log::debug!("Unable to deregister socket {}: {}", group.raw_fd(), err);
            }
            log::debug!("Closed socket {}", group.raw_fd());
        }
    }
}
