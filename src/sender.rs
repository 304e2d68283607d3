use socket2::{Domain, Protocol, Socket, Type};

use std::fs::File;
use std::io::{self, Read};
use std::net::{Ipv4Addr, SocketAddrV4};
use std::path::Path;

/// Accepted message file size bounds, in bytes.
pub const MIN_MESSAGE_SIZE: u64 = 1;
pub const MAX_MESSAGE_SIZE: u64 = 32768;

/// Failure stage of the one-shot send path. Each stage maps to its own
/// process exit code, kept stable for scripting against the tool.
#[derive(Debug)]
pub enum SendError {
    Open(io::Error),
    SizeQuery(io::Error),
    SizeOutOfRange(u64),
    Read(io::Error),
    Create(io::Error),
    Bind(io::Error),
    SetInterface(io::Error),
    Send(io::Error),
}

impl SendError {
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Open(..) => 5,
            Self::SizeQuery(..) => 6,
            Self::SizeOutOfRange(..) => 7,
            Self::Read(..) => 9,
            Self::Create(..) => 10,
            Self::Bind(..) => 11,
            Self::SetInterface(..) => 12,
            Self::Send(..) => 13,
        }
    }
}

impl std::error::Error for SendError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::SizeOutOfRange(..) => None,
            Self::Open(err)
            | Self::SizeQuery(err)
            | Self::Read(err)
            | Self::Create(err)
            | Self::Bind(err)
            | Self::SetInterface(err)
            | Self::Send(err) => Some(err),
        }
    }
}

impl std::fmt::Display for SendError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Open(err) => write!(f, "unable to open message file: {}", err),
            Self::SizeQuery(err) => write!(f, "unable to get message size: {}", err),
            Self::SizeOutOfRange(size) => write!(
                f,
                "file size {} not in valid range ({}-{} bytes)",
                size, MIN_MESSAGE_SIZE, MAX_MESSAGE_SIZE
            ),
            Self::Read(err) => write!(f, "unable to read message file: {}", err),
            Self::Create(err) => write!(f, "unable to create socket: {}", err),
            Self::Bind(err) => write!(f, "unable to bind socket: {}", err),
            Self::SetInterface(err) => {
                write!(f, "unable to set multicast interface: {}", err)
            }
            Self::Send(err) => write!(f, "unable to send message: {}", err),
        }
    }
}

/// Reads the whole message file into memory, rejecting sizes outside
/// [`MIN_MESSAGE_SIZE`, `MAX_MESSAGE_SIZE`] before reading a byte.
pub fn load_message(path: &Path) -> Result<Vec<u8>, SendError> {
    let mut file = File::open(path).map_err(SendError::Open)?;

    let size = file.metadata().map_err(SendError::SizeQuery)?.len();
    if size < MIN_MESSAGE_SIZE || size > MAX_MESSAGE_SIZE {
        return Err(SendError::SizeOutOfRange(size))
    }

    let mut payload = Vec::with_capacity(size as usize);
    file.read_to_end(&mut payload).map_err(SendError::Read)?;
    Ok(payload)
}

/// Sends the whole payload as one datagram to the group, egressing through
/// the given interface. The socket lives only for this call.
pub fn send_message(
    multicast: Ipv4Addr,
    port: u16,
    interface: Ipv4Addr,
    payload: &[u8],
) -> Result<usize, SendError> {
    let socket =
        Socket::new(Domain::IPV4, Type::DGRAM, Some(Protocol::UDP)).map_err(SendError::Create)?;

    socket
        .bind(&SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, 0).into())
        .map_err(SendError::Bind)?;

    // Multicast has no implicit egress routing by destination alone.
    socket.set_multicast_if_v4(&interface).map_err(SendError::SetInterface)?;

    let destination = SocketAddrV4::new(multicast, port);
    let sent = socket.send_to(payload, &destination.into()).map_err(SendError::Send)?;
    log::debug!("Sent {} bytes to {}", sent, destination);
    Ok(sent)
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::path::PathBuf;

    #[test]
    fn empty_file_rejected() {
        let path = message_file("empty", 0);
        let result = load_message(&path);
        std::fs::remove_file(&path).unwrap();
        assert!(matches!(result, Err(SendError::SizeOutOfRange(0))));
    }

    #[test]
    fn max_size_file_accepted() {
        let path = message_file("max", MAX_MESSAGE_SIZE as usize);
        let result = load_message(&path);
        std::fs::remove_file(&path).unwrap();
        assert_eq!(result.unwrap().len() as u64, MAX_MESSAGE_SIZE);
    }

    #[test]
    fn oversized_file_rejected() {
        let path = message_file("over", MAX_MESSAGE_SIZE as usize + 1);
        let result = load_message(&path);
        std::fs::remove_file(&path).unwrap();
        assert!(matches!(result, Err(SendError::SizeOutOfRange(size)) if size == MAX_MESSAGE_SIZE + 1));
    }

    #[test]
    fn missing_file_fails_at_open() {
        let path = std::env::temp_dir().join("multicast-probe-no-such-file");
        assert!(matches!(load_message(&path), Err(SendError::Open(..))));
    }

    #[test]
    fn exit_codes_are_stable() {
        let io = || io::Error::new(io::ErrorKind::Other, "test");
        assert_eq!(SendError::Open(io()).exit_code(), 5);
        assert_eq!(SendError::SizeQuery(io()).exit_code(), 6);
        assert_eq!(SendError::SizeOutOfRange(0).exit_code(), 7);
        assert_eq!(SendError::Read(io()).exit_code(), 9);
        assert_eq!(SendError::Create(io()).exit_code(), 10);
        assert_eq!(SendError::Bind(io()).exit_code(), 11);
        assert_eq!(SendError::SetInterface(io()).exit_code(), 12);
        assert_eq!(SendError::Send(io()).exit_code(), 13);
    }

    fn message_file(name: &str, size: usize) -> PathBuf {
        let path = std::env::temp_dir()
            .join(format!("multicast-probe-send-{}-{}", std::process::id(), name));
        std::fs::write(&path, vec![0x42; size]).unwrap();
        path
    }
}
