pub mod h2settings;
pub mod orderedheaders;
pub(crate) mod pump;
pub(crate) mod record;
pub mod request;
pub mod requestbody;
pub(crate) mod signal;
pub mod stream;

// Re-exports for convenience
pub use h2settings::{H2Settings, Setting, SettingId};
pub use orderedheaders::OrderedHeaderMap;
pub use request::HttpRequest;
pub use requestbody::RequestBody;
pub use stream::Stream;
