pub mod backend;
pub mod cdp;
pub mod helper;
pub mod injector;
pub mod launch;
pub mod locator;
pub mod tabs;

pub use backend::{AutomationBackend, AutomationSession, CdpBackend, TabHandle};
pub use helper::{PageSourceScanner, SourceScan, SourceScanner};
pub use injector::{BatchInjector, FilePayload, Injector};
pub use locator::{Locator, LocatorStrategy, LocatorTarget};
pub use tabs::{extract_notebook_id, notebook_url, Navigator, TabNavigator};
