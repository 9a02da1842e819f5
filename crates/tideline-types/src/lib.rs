//! Shared type definitions for the Tideline timeline feed.
//!
//! This crate is the single source of truth for the data shapes exchanged
//! between the feed engine and the rendering layer. Types defined here flow
//! downstream to `TypeScript` via `ts-rs` for the timeline widget.
//!
//! # Modules
//!
//! - [`event`] -- Raw wire messages and canonical events
//! - [`subscription`] -- Feed mode, subscription descriptor, control requests
//! - [`timeline`] -- Feed status, timeline snapshot, day groups, category styles

pub mod event;
pub mod subscription;
pub mod timeline;

// Re-export all public types at crate root for convenience.
pub use event::{Event, RawMessage};
pub use subscription::{FeedMode, SubscriptionDescriptor, SubscriptionRequest, UnknownFeedMode};
pub use timeline::{CategoryStyle, DayBucket, EventGroup, FeedStatus, TimelineView};

#[cfg(test)]
mod tests {
    //! `TypeScript` binding generation.

    #[test]
    fn export_bindings() {
        // The actual files are written to the `bindings/` directory
        // relative to the crate root.
        use ts_rs::TS;

        let _ = crate::event::RawMessage::export_all();
        let _ = crate::event::Event::export_all();

        let _ = crate::subscription::FeedMode::export_all();
        let _ = crate::subscription::SubscriptionDescriptor::export_all();
        let _ = crate::subscription::SubscriptionRequest::export_all();

        let _ = crate::timeline::FeedStatus::export_all();
        let _ = crate::timeline::TimelineView::export_all();
        let _ = crate::timeline::DayBucket::export_all();
        let _ = crate::timeline::EventGroup::export_all();
        let _ = crate::timeline::CategoryStyle::export_all();
    }
}
