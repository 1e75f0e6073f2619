use std::{
    path::{Path, PathBuf},
    sync::mpsc::{self, Receiver, TryRecvError},
    thread,
};

use anyhow::Context;

pub struct GltfAsset {
    pub path: PathBuf,
    pub document: gltf::Document,
    pub buffers: Vec<gltf::buffer::Data>,
}

impl GltfAsset {
    pub fn import(path: &Path) -> anyhow::Result<Self> {
        let (document, buffers, _images) = gltf::import(path)
            .with_context(|| format!("Failed to import glTF file {}", path.display()))?;

        Ok(Self {
            path: path.to_path_buf(),
            document,
            buffers,
        })
    }

    pub fn scene(&self) -> anyhow::Result<gltf::Scene<'_>> {
        self.document
            .default_scene()
            .or_else(|| self.document.scenes().next())
            .with_context(|| format!("No scenes in {}", self.path.display()))
    }
}

pub enum AssetPoll {
    Pending,
    Ready(GltfAsset),
    Failed(anyhow::Error),
}

/// A glTF import running on a worker thread.
pub struct PendingAsset {
    path: PathBuf,
    receiver: Receiver<anyhow::Result<GltfAsset>>,
}

impl PendingAsset {
    pub fn spawn(path: impl Into<PathBuf>) -> anyhow::Result<Self> {
        let path = path.into();
        let (sender, receiver) = mpsc::channel();

        let worker_path = path.clone();
        thread::Builder::new()
            .name("asset-loader".to_string())
            .spawn(move || {
                log::debug!("Importing {}", worker_path.display());
                // The receiver may be gone if the viewer shut down first.
                let _ = sender.send(GltfAsset::import(&worker_path));
            })
            .context("Failed to spawn asset loader thread")?;

        Ok(Self { path, receiver })
    }

    /// Never blocks. After `Ready` or `Failed` the pending asset should be dropped.
    pub fn poll(&self) -> AssetPoll {
        match self.receiver.try_recv() {
            Ok(Ok(asset)) => AssetPoll::Ready(asset),
            Ok(Err(error)) => AssetPoll::Failed(error),
            Err(TryRecvError::Empty) => AssetPoll::Pending,
            Err(TryRecvError::Disconnected) => AssetPoll::Failed(anyhow::anyhow!(
                "Asset loader for {} stopped without a result",
                self.path.display()
            )),
        }
    }
}
