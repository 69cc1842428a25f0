use shared::ClassifierKind;
use std::path::Path;
use std::sync::Arc;

use super::model::load_classifier;
use super::{Classifier, ModelError};
use crate::config::ModelDirs;

/// The three classifiers, loaded once at startup and shared read-only.
#[derive(Clone)]
pub struct ModelRegistry {
    damage: Arc<dyn Classifier>,
    side: Arc<dyn Classifier>,
    level: Arc<dyn Classifier>,
}

impl ModelRegistry {
    pub fn load(dirs: &ModelDirs) -> Result<Self, ModelError> {
        Ok(Self::new(
            load_kind(ClassifierKind::Damage, &dirs.damage)?,
            load_kind(ClassifierKind::Side, &dirs.side)?,
            load_kind(ClassifierKind::Level, &dirs.level)?,
        ))
    }

    pub fn new(
        damage: Arc<dyn Classifier>,
        side: Arc<dyn Classifier>,
        level: Arc<dyn Classifier>,
    ) -> Self {
        Self {
            damage,
            side,
            level,
        }
    }

    pub fn get(&self, kind: ClassifierKind) -> &dyn Classifier {
        match kind {
            ClassifierKind::Damage => self.damage.as_ref(),
            ClassifierKind::Side => self.side.as_ref(),
            ClassifierKind::Level => self.level.as_ref(),
        }
    }
}

fn load_kind(kind: ClassifierKind, dir: &Path) -> Result<Arc<dyn Classifier>, ModelError> {
    log::info!("Loading {} model from {}", kind, dir.display());
    let classifier: Arc<dyn Classifier> = Arc::from(load_classifier(dir)?);
    log::info!("{} classes: {:?}", kind, classifier.classes());
    Ok(classifier)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::model::StaticClassifier;
    use std::path::PathBuf;

    #[test]
    fn get_returns_matching_classifier() {
        let registry = ModelRegistry::new(
            Arc::new(StaticClassifier::new(&["damaged", "whole"], &[0.9, 0.1])),
            Arc::new(StaticClassifier::new(&["front", "rear", "side"], &[0.2, 0.5, 0.3])),
            Arc::new(StaticClassifier::new(&["minor", "moderate", "severe"], &[0.6, 0.3, 0.1])),
        );
        assert_eq!(registry.get(ClassifierKind::Damage).classes().len(), 2);
        assert_eq!(registry.get(ClassifierKind::Side).classes()[2], "side");
        assert_eq!(registry.get(ClassifierKind::Level).classes()[0], "minor");
    }

    #[test]
    fn load_fails_without_artifacts() {
        let root = tempfile::tempdir().unwrap();
        let dirs = ModelDirs {
            damage: root.path().join("damage-model"),
            side: PathBuf::from("unused"),
            level: PathBuf::from("unused"),
        };
        assert!(matches!(
            ModelRegistry::load(&dirs),
            Err(ModelError::MissingDirectory(path)) if path == dirs.damage
        ));
    }
}
