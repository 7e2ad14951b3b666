mod navigator;
mod scheme;
mod session;
mod window;

pub use navigator::Navigator;
pub use scheme::{hcp_payload, HcpHandler, SchemeHandler, SchemeRegistry};
pub use session::Session;
pub use window::Window;
