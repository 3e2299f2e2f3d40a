// Copyright (c) 2025, Jason Jenkins
// SPDX-License-Identifier: BSD-3-Clause

//! Review session.
//!
//! A session holds the configuration and the annotation file in use, and at
//! most one open video. Opening another video replaces the store wholesale.

use crate::config::AppConfig;
use crate::error::Result;
use crate::io::media::MediaProbe;
use crate::models::record::VideoIdentity;
use crate::models::taxonomy::ReasonCatalog;
use crate::store::{AnnotationStore, LoadOptions};
use std::path::{Path, PathBuf};
use std::sync::Arc;

pub struct Session {
    config: AppConfig,
    catalog: Arc<ReasonCatalog>,
    annotation_file: PathBuf,
    current: Option<AnnotationStore>,
}

impl Session {
    pub fn new(config: AppConfig, annotation_file: PathBuf) -> Self {
        let catalog = Arc::new(config.catalog());
        Self {
            config,
            catalog,
            annotation_file,
            current: None,
        }
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn current(&self) -> Option<&AnnotationStore> {
        self.current.as_ref()
    }

    pub fn current_mut(&mut self) -> Option<&mut AnnotationStore> {
        self.current.as_mut()
    }

    /// Open a video, validating its checksum if the configuration asks for
    /// it. On failure the previously open video stays open.
    pub fn open_video(&mut self, path: &Path, probe: &dyn MediaProbe) -> Result<&mut AnnotationStore> {
        let options = LoadOptions {
            validate_checksum: self.config.application.enable_hashsum_validation,
        };
        let identity = VideoIdentity::from_file(path, probe)?;
        self.open_identity(identity, options)
    }

    /// Open a video and keep its old annotations even if its contents
    /// changed.
    pub fn open_video_unchecked(
        &mut self,
        path: &Path,
        probe: &dyn MediaProbe,
    ) -> Result<&mut AnnotationStore> {
        let identity = VideoIdentity::from_file(path, probe)?;
        self.open_identity(
            identity,
            LoadOptions {
                validate_checksum: false,
            },
        )
    }

    /// Open a video with no annotations, discarding what was stored for its
    /// current contents.
    pub fn open_video_fresh(&mut self, path: &Path, probe: &dyn MediaProbe) -> Result<&mut AnnotationStore> {
        let identity = VideoIdentity::from_file(path, probe)?;
        let store = AnnotationStore::open_fresh(
            &self.annotation_file,
            identity,
            Arc::clone(&self.catalog),
            self.config.application.clone(),
        )?;
        Ok(self.current.insert(store))
    }

    fn open_identity(
        &mut self,
        identity: VideoIdentity,
        options: LoadOptions,
    ) -> Result<&mut AnnotationStore> {
        let store = AnnotationStore::open(
            &self.annotation_file,
            identity,
            Arc::clone(&self.catalog),
            self.config.application.clone(),
            options,
        )?;
        log::info!(
            "Opened {} with {} clip(s)",
            store.identity().path.display(),
            store.clip_ids().len()
        );
        Ok(self.current.insert(store))
    }

    /// Release the open video, if any.
    pub fn close(&mut self) {
        if let Some(store) = self.current.take() {
            log::debug!("Closed {}", store.identity().path.display());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AnnotationError;
    use crate::io::media::{FixedProbe, StreamInfo};
    use crate::models::clip::{ClipId, Label};
    use assert_matches::assert_matches;
    use tempfile::TempDir;

    const PROBE: FixedProbe = FixedProbe(StreamInfo {
        frame_count: 100,
        fps: 25.0,
    });

    fn session(dir: &TempDir) -> Session {
        Session::new(AppConfig::default(), dir.path().join("annotations.json"))
    }

    #[test]
    fn test_switching_videos_replaces_store() {
        let dir = TempDir::new().unwrap();
        let a = dir.path().join("a.mp4");
        let b = dir.path().join("b.mp4");
        std::fs::write(&a, b"first").unwrap();
        std::fs::write(&b, b"second").unwrap();
        let mut session = session(&dir);

        let store = session.open_video(&a, &PROBE).unwrap();
        store.toggle_break_point(50).unwrap();

        let store = session.open_video(&b, &PROBE).unwrap();
        assert!(store.break_points().is_empty());

        let store = session.open_video(&a, &PROBE).unwrap();
        assert!(store.break_points().contains(&50));

        session.close();
        assert!(session.current().is_none());
    }

    #[test]
    fn test_changed_video_needs_a_decision() {
        let dir = TempDir::new().unwrap();
        let video = dir.path().join("a.mp4");
        std::fs::write(&video, b"take one").unwrap();
        let mut session = session(&dir);

        let store = session.open_video(&video, &PROBE).unwrap();
        store
            .set_label(&[ClipId::new(0, 100)], Label::Accept, &["1".to_string()])
            .unwrap();
        let first_checksum = store.identity().checksum.clone();

        std::fs::write(&video, b"take two").unwrap();
        assert_matches!(
            session.open_video(&video, &PROBE),
            Err(AnnotationError::Integrity { .. })
        );
        // The failed open keeps the previous store.
        assert_eq!(session.current().unwrap().identity().checksum, first_checksum);

        let store = session.open_video_unchecked(&video, &PROBE).unwrap();
        assert_eq!(
            store.annotation(ClipId::new(0, 100)).unwrap().label,
            Some(Label::Accept)
        );

        let store = session.open_video_fresh(&video, &PROBE).unwrap();
        assert_eq!(store.annotation(ClipId::new(0, 100)).unwrap().label, None);
    }

    #[test]
    fn test_changed_video_is_caught_under_another_path_spelling() {
        let dir = TempDir::new().unwrap();
        let video = dir.path().join("a.mp4");
        std::fs::write(&video, b"take one").unwrap();
        let mut session = session(&dir);

        let store = session.open_video(&video, &PROBE).unwrap();
        store
            .set_label(&[ClipId::new(0, 100)], Label::Accept, &["1".to_string()])
            .unwrap();

        // Same contents, other spelling: the record is found.
        let dotted = dir.path().join(".").join("a.mp4");
        let store = session.open_video(&dotted, &PROBE).unwrap();
        assert_eq!(
            store.annotation(ClipId::new(0, 100)).unwrap().label,
            Some(Label::Accept)
        );

        std::fs::write(&video, b"take two").unwrap();
        assert_matches!(
            session.open_video(&dotted, &PROBE),
            Err(AnnotationError::Integrity { .. })
        );

        // Adopting under the other spelling keeps a single record.
        session
            .open_video_unchecked(&dotted, &PROBE)
            .unwrap()
            .toggle_break_point(50)
            .unwrap();
        let file = crate::io::serialization::read(&dir.path().join("annotations.json")).unwrap();
        assert_eq!(file.records.len(), 1);
    }

    #[test]
    fn test_validation_can_be_disabled_in_config() {
        let dir = TempDir::new().unwrap();
        let video = dir.path().join("a.mp4");
        std::fs::write(&video, b"take one").unwrap();
        let mut config = AppConfig::default();
        config.application.enable_hashsum_validation = false;
        let mut session = Session::new(config, dir.path().join("annotations.json"));

        session.open_video(&video, &PROBE).unwrap().toggle_break_point(10).unwrap();
        std::fs::write(&video, b"take two").unwrap();
        let store = session.open_video(&video, &PROBE).unwrap();
        assert!(store.break_points().contains(&10));
    }
}
