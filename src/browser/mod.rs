pub mod dom;
pub mod highlight;
pub mod manager;
pub mod page;
pub mod pool;

pub use dom::{
    format_elements_for_llm, has_significant_dom_change, index_elements, BoundingBox,
    DomChangeThresholds, ElementSnapshot, IndexedElement,
};
pub use highlight::screenshot_with_highlights;
pub use manager::{ChromeSession, LaunchOptions, Viewport};
pub use page::{Cookie, PageDriver};
pub use pool::{SessionPool, SessionProvider};
