mod endpoint;
mod monitor;
mod provision;
mod sender;

pub use endpoint::{
    parse_all, EndpointError, EndpointSetError, MulticastEndpoint, MAX_ENDPOINTS, MAX_INTERFACES,
};
pub use monitor::{Monitor, MonitorEvent, ShutdownHandle, READ_BUFFER_SIZE};
pub use provision::{provision, GroupSocket, ProvisionError, ProvisionStage};
pub use sender::{
    load_message, send_message, SendError, MAX_MESSAGE_SIZE, MIN_MESSAGE_SIZE,
};
