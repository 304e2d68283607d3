use std::net::{Ipv4Addr, SocketAddrV4};
use std::str::FromStr;

/// Maximum number of interface addresses one endpoint can join on.
pub const MAX_INTERFACES: usize = 20;

/// Maximum number of endpoints (and therefore sockets) one process handles.
pub const MAX_ENDPOINTS: usize = 50;

/// One multicast group to watch: the group address, the UDP port, and the
/// interfaces whose membership should be requested, in the order they were
/// written.
///
/// Parsed from the string format `MULTICAST_IP:PORT:INTERFACE_IP[,INTERFACE_IP...]`
/// and immutable afterwards.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct MulticastEndpoint {
    multicast: Ipv4Addr,
    port: u16,
    interfaces: Vec<Ipv4Addr>,
}

impl MulticastEndpoint {
    pub fn multicast(&self) -> Ipv4Addr {
        self.multicast
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// Interface addresses in encounter order.
    pub fn interfaces(&self) -> &[Ipv4Addr] {
        &self.interfaces
    }

    /// The group/port pair the receiving socket binds to.
    pub fn group_addr(&self) -> SocketAddrV4 {
        SocketAddrV4::new(self.multicast, self.port)
    }
}

impl FromStr for MulticastEndpoint {
    type Err = EndpointError;

    fn from_str(spec: &str) -> Result<Self, Self::Err> {
        let (multicast_str, rest) = match spec.split_once(':') {
            Some(split) => split,
            None => return Err(EndpointError::MissingPort),
        };

        let multicast = multicast_str
            .parse::<Ipv4Addr>()
            .map_err(|_| EndpointError::InvalidMulticastAddr(multicast_str.into()))?;

        let (port_str, interfaces_str) = match rest.split_once(':') {
            Some(split) => split,
            None => return Err(EndpointError::MissingInterfaces),
        };

        // u16::from_str is exactly the rule wanted: base-10, no stray
        // characters, fits in 16 bits.
        let port = port_str
            .parse::<u16>()
            .map_err(|_| EndpointError::InvalidPort(port_str.into()))?;

        let mut interfaces = Vec::new();
        for interface_str in interfaces_str.split(',') {
            let interface = interface_str
                .parse::<Ipv4Addr>()
                .map_err(|_| EndpointError::InvalidInterfaceAddr(interface_str.into()))?;

            if interfaces.len() >= MAX_INTERFACES {
                return Err(EndpointError::TooManyInterfaces)
            }
            interfaces.push(interface);
        }

        Ok(Self { multicast, port, interfaces })
    }
}

impl std::fmt::Display for MulticastEndpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}:", self.multicast, self.port)?;
        for (i, interface) in self.interfaces.iter().enumerate() {
            if i > 0 {
                write!(f, ",")?;
            }
            write!(f, "{}", interface)?;
        }
        Ok(())
    }
}

/// Reason one endpoint specification string was rejected.
#[derive(Clone, PartialEq, Eq, Debug)]
pub enum EndpointError {
    /// No `:` separator after the multicast address.
    MissingPort,
    /// No `:` separator after the port.
    MissingInterfaces,
    InvalidMulticastAddr(String),
    InvalidPort(String),
    InvalidInterfaceAddr(String),
    TooManyInterfaces,
}

impl std::error::Error for EndpointError {}

impl std::fmt::Display for EndpointError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MissingPort => write!(f, "missing ':' separator before the port"),
            Self::MissingInterfaces => {
                write!(f, "missing ':' separator before the interface list")
            }
            Self::InvalidMulticastAddr(text) => {
                write!(f, "invalid multicast address: '{}'", text)
            }
            Self::InvalidPort(text) => write!(f, "invalid port: '{}'", text),
            Self::InvalidInterfaceAddr(text) => {
                write!(f, "invalid interface address: '{}'", text)
            }
            Self::TooManyInterfaces => {
                write!(f, "more than {} interface addresses", MAX_INTERFACES)
            }
        }
    }
}

/// Reason a whole batch of endpoint arguments was rejected.
#[derive(Clone, PartialEq, Eq, Debug)]
pub enum EndpointSetError {
    TooManyEndpoints(usize),
    /// `index` is the 1-based position of the offending argument.
    Invalid { index: usize, source: EndpointError },
}

impl std::error::Error for EndpointSetError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::TooManyEndpoints(..) => None,
            Self::Invalid { source, .. } => Some(source),
        }
    }
}

impl std::fmt::Display for EndpointSetError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::TooManyEndpoints(count) => {
                write!(f, "too many multicast addresses given: {} (limit {})", count, MAX_ENDPOINTS)
            }
            Self::Invalid { index, source } => {
                write!(f, "error parsing argument {}: {}", index, source)
            }
        }
    }
}

/// Parses every positional argument into an endpoint, in argument order.
/// Any single failure aborts the whole batch; nothing partial is returned.
pub fn parse_all<S: AsRef<str>>(specs: &[S]) -> Result<Vec<MulticastEndpoint>, EndpointSetError> {
    if specs.len() > MAX_ENDPOINTS {
        return Err(EndpointSetError::TooManyEndpoints(specs.len()))
    }

    let mut endpoints = Vec::with_capacity(specs.len());
    for (index, spec) in specs.iter().enumerate() {
        match spec.as_ref().parse() {
            Ok(endpoint) => endpoints.push(endpoint),
            Err(source) => return Err(EndpointSetError::Invalid { index: index + 1, source }),
        }
    }
    Ok(endpoints)
}

#[cfg(test)]
mod tests {
    use super::*;

    use test_case::test_case;

    #[test]
    fn single_interface() {
        let endpoint: MulticastEndpoint = "239.1.1.1:5000:127.0.0.1".parse().unwrap();
        assert_eq!(endpoint.multicast(), Ipv4Addr::new(239, 1, 1, 1));
        assert_eq!(endpoint.port(), 5000);
        assert_eq!(endpoint.interfaces(), &[Ipv4Addr::new(127, 0, 0, 1)]);
    }

    #[test]
    fn interfaces_keep_encounter_order() {
        let endpoint: MulticastEndpoint = "239.1.1.1:5000:127.0.0.1,10.0.0.1".parse().unwrap();
        assert_eq!(
            endpoint.interfaces(),
            &[Ipv4Addr::new(127, 0, 0, 1), Ipv4Addr::new(10, 0, 0, 1)]
        );
    }

    #[test_case("239.1.1.1:port:127.0.0.1", "port"; "non numeric")]
    #[test_case("239.1.1.1:65536:127.0.0.1", "65536"; "value over u16")]
    #[test_case("239.1.1.1:5000x:127.0.0.1", "5000x"; "trailing characters")]
    #[test_case("239.1.1.1:-1:127.0.0.1", "-1"; "negative")]
    fn invalid_port(spec: &str, offending: &str) {
        let result = spec.parse::<MulticastEndpoint>();
        assert_eq!(result, Err(EndpointError::InvalidPort(offending.into())));
    }

    #[test_case("example.org:5000:127.0.0.1"; "hostname")]
    #[test_case("239.1.1:5000:127.0.0.1"; "three octets")]
    #[test_case(":5000:127.0.0.1"; "empty address")]
    fn invalid_multicast_address(spec: &str) {
        assert!(matches!(
            spec.parse::<MulticastEndpoint>(),
            Err(EndpointError::InvalidMulticastAddr(..))
        ));
    }

    #[test_case("239.1.1.1:5000:"; "empty list")]
    #[test_case("239.1.1.1:5000:127.0.0.1,"; "trailing comma")]
    #[test_case("239.1.1.1:5000:127.0.0.1,lo"; "interface name instead of ip")]
    fn invalid_interface_address(spec: &str) {
        assert!(matches!(
            spec.parse::<MulticastEndpoint>(),
            Err(EndpointError::InvalidInterfaceAddr(..))
        ));
    }

    #[test]
    fn missing_separators() {
        assert_eq!("239.1.1.1".parse::<MulticastEndpoint>(), Err(EndpointError::MissingPort));
        assert_eq!(
            "239.1.1.1:5000".parse::<MulticastEndpoint>(),
            Err(EndpointError::MissingInterfaces)
        );
    }

    #[test]
    fn twenty_interfaces_accepted() {
        let spec = spec_with_interfaces(MAX_INTERFACES);
        let endpoint: MulticastEndpoint = spec.parse().unwrap();
        assert_eq!(endpoint.interfaces().len(), MAX_INTERFACES);
    }

    #[test]
    fn twenty_one_interfaces_rejected() {
        let spec = spec_with_interfaces(MAX_INTERFACES + 1);
        assert_eq!(spec.parse::<MulticastEndpoint>(), Err(EndpointError::TooManyInterfaces));
    }

    #[test]
    fn batch_keeps_argument_order() {
        let endpoints =
            parse_all(&["239.1.1.1:5000:127.0.0.1", "239.1.1.2:5001:127.0.0.1"]).unwrap();
        assert_eq!(endpoints.len(), 2);
        assert_eq!(endpoints[0].port(), 5000);
        assert_eq!(endpoints[1].port(), 5001);
    }

    #[test]
    fn batch_reports_offending_argument() {
        let result = parse_all(&["239.1.1.1:5000:127.0.0.1", "239.1.1.2:xx:127.0.0.1"]);
        assert_eq!(
            result,
            Err(EndpointSetError::Invalid {
                index: 2,
                source: EndpointError::InvalidPort("xx".into()),
            })
        );
    }

    #[test]
    fn fifty_endpoints_accepted() {
        let specs = vec!["239.1.1.1:5000:127.0.0.1"; MAX_ENDPOINTS];
        assert_eq!(parse_all(&specs).unwrap().len(), MAX_ENDPOINTS);
    }

    #[test]
    fn fifty_one_endpoints_rejected() {
        let specs = vec!["239.1.1.1:5000:127.0.0.1"; MAX_ENDPOINTS + 1];
        assert_eq!(parse_all(&specs), Err(EndpointSetError::TooManyEndpoints(MAX_ENDPOINTS + 1)));
    }

    fn spec_with_interfaces(count: usize) -> String {
        let interfaces =
            (0..count).map(|i| format!("10.0.0.{}", i + 1)).collect::<Vec<_>>().join(",");
        format!("239.1.1.1:5000:{}", interfaces)
    }
}
