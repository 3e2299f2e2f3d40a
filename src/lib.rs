// Copyright (c) 2025, Jason Jenkins
// SPDX-License-Identifier: BSD-3-Clause

//! CLIPMARK - clip segmentation and labelling for video review
//!
//! A reviewer divides a video into clips by placing break points, labels
//! each clip Accept or Reject with reasons taken from a configured taxonomy,
//! and marks keyframes inside clips. [`store::AnnotationStore`] holds that
//! state for one video and writes it through to a shared annotation file
//! after every change.

pub mod config;
pub mod error;
pub mod io;
pub mod models;
pub mod session;
pub mod store;
pub mod util;

pub use config::AppConfig;
pub use error::{AnnotationError, Result};
pub use models::clip::{Clip, ClipAnnotation, ClipId, Frame, Label};
pub use models::record::VideoIdentity;
pub use session::Session;
pub use store::{AnnotationStore, Direction, LoadOptions, Target, Toggled};
