mod provider;
#[allow(clippy::module_inception)]
mod resolve;

pub use provider::capture::extract_ipv4;
pub use provider::capture::TrafficCaptureResolver;
pub use provider::dns::DnsQueryResolver;
pub use provider::fixed::StaticResolver;
pub use provider::http::HttpProbeResolver;
pub use provider::system::SystemLookupResolver;
pub use resolve::Resolve;
pub use resolve::ResolveExt;
