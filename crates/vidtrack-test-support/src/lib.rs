#![forbid(unsafe_code)]
#![deny(
    warnings,
    dead_code,
    unused,
    unused_imports,
    unused_must_use,
    unreachable_pub,
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    rustdoc::broken_intra_doc_links,
    rustdoc::bare_urls,
    missing_docs
)]

//! Shared test helpers used across integration suites.
//! Layout: fixtures.rs (tool probes, sample media), workspace.rs (temp layout and fake tracker).

pub mod fixtures;
pub mod workspace;

pub use fixtures::{
    VideoStreamInfo, assert_browser_playable, inspect_video_stream, mp4_top_level_boxes,
    tool_available, write_sample_video,
};
pub use workspace::{FakeTracker, TestWorkspace, fake_tracker_config};
