pub mod source;
pub mod notifier;

pub use source::{CountedPage, SourceAdapter, PaginationScheme};
pub use notifier::{NotificationSink, DispatchReport, format_offer_line};
