// Copyright (c) 2025, Jason Jenkins
// SPDX-License-Identifier: BSD-3-Clause

//! Data model for clip annotations.

pub mod clip;
pub mod record;
pub mod taxonomy;
