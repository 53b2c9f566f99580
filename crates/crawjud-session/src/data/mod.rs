mod har;
mod options;
mod session;

pub use har::{Har, HarContent, HarEntry, HarLog, HarNameValue, HarRequest, HarResponse};
pub use options::{AuthOptions, WebDriverOptions};
pub use session::{AuthState, PjeUrls, SessionContext};
