pub mod adapter;
pub mod chromium;

pub use adapter::{NavigateWait, PageAdapter};
pub use chromium::ChromiumAdapter;
