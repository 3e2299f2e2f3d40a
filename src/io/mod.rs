// Copyright (c) 2025, Jason Jenkins
// SPDX-License-Identifier: BSD-3-Clause

//! I/O operations for media, motion data and annotation files.

pub mod flow;
pub mod media;
pub mod serialization;
