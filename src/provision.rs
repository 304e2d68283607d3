use crate::endpoint::MulticastEndpoint;

use mio::net::UdpSocket;

use socket2::{Domain, Protocol, Socket, Type};

use std::io;
use std::os::fd::{AsRawFd, RawFd};

/// A socket bound to one multicast endpoint, subscribed on every interface
/// the endpoint lists. Owns the handle until dropped; closing is the drop.
pub struct GroupSocket {
    socket: UdpSocket,
    endpoint: MulticastEndpoint,
    fd: RawFd,
}

impl GroupSocket {
    pub fn raw_fd(&self) -> RawFd {
        self.fd
    }

    pub fn endpoint(&self) -> &MulticastEndpoint {
        &self.endpoint
    }

    /// Number of interfaces whose group membership was requested.
    pub fn joined_interfaces(&self) -> usize {
        self.endpoint.interfaces().len()
    }

    pub(crate) fn socket(&self) -> &UdpSocket {
        &self.socket
    }

    pub(crate) fn socket_mut(&mut self) -> &mut UdpSocket {
        &mut self.socket
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum ProvisionStage {
    Create,
    Bind,
    Join,
}

/// Why provisioning stopped, and on which endpoint (1-based).
#[derive(Debug)]
pub struct ProvisionError {
    pub index: usize,
    pub stage: ProvisionStage,
    pub source: io::Error,
}

impl std::error::Error for ProvisionError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.source)
    }
}

impl std::fmt::Display for ProvisionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let stage = match self.stage {
            ProvisionStage::Create => "creating socket",
            ProvisionStage::Bind => "binding to multicast address",
            ProvisionStage::Join => "adding multicast group membership",
        };
        write!(f, "error {} for endpoint {}: {}", stage, self.index, self.source)
    }
}

/// Builds one socket per endpoint, in endpoint order.
///
/// The first failure aborts; sockets already built are closed when the
/// returned error drops them.
pub fn provision(endpoints: &[MulticastEndpoint]) -> Result<Vec<GroupSocket>, ProvisionError> {
    let mut sockets = Vec::with_capacity(endpoints.len());
    for (index, endpoint) in endpoints.iter().enumerate() {
        let socket = build_group_socket(endpoint)
            .map_err(|(stage, source)| ProvisionError { index: index + 1, stage, source })?;

        log::debug!("Socket {} provisioned for endpoint {}", socket.raw_fd(), endpoint);
        sockets.push(socket);
    }
    Ok(sockets)
}

fn build_group_socket(
    endpoint: &MulticastEndpoint,
) -> Result<GroupSocket, (ProvisionStage, io::Error)> {
    let socket = Socket::new(Domain::IPV4, Type::DGRAM, Some(Protocol::UDP))
        .map_err(|err| (ProvisionStage::Create, err))?;
    socket.set_nonblocking(true).map_err(|err| (ProvisionStage::Create, err))?;

    // Several sockets may bind the same group/port pair (one per endpoint
    // argument), and a restarted process must be able to rebind at once.
    socket.set_reuse_address(true).map_err(|err| (ProvisionStage::Create, err))?;
    #[cfg(unix)]
    socket.set_reuse_port(true).map_err(|err| (ProvisionStage::Create, err))?;

    // Binding to the group address itself, not the wildcard, so this socket
    // only sees that group's traffic.
    socket
        .bind(&endpoint.group_addr().into())
        .map_err(|err| (ProvisionStage::Bind, err))?;

    for interface in endpoint.interfaces() {
        socket
            .join_multicast_v4(&endpoint.multicast(), interface)
            .map_err(|err| (ProvisionStage::Join, err))?;
    }

    let fd = socket.as_raw_fd();
    Ok(GroupSocket { socket: UdpSocket::from_std(socket.into()), endpoint: endpoint.clone(), fd })
}
