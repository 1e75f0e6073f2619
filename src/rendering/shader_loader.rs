use std::{
    path::{Path, PathBuf},
    sync::{
        mpsc::{self, channel},
        Arc, RwLock,
    },
    time::Duration,
};

use anyhow::Context;
use id_arena::{Arena, Id};
use naga::{
    back::wgsl::WriterFlags,
    valid::{Capabilities, ValidationFlags},
};
use naga_oil::compose::{
    ComposableModuleDescriptor, Composer, NagaModuleDescriptor, ShaderLanguage,
};
use notify_debouncer_mini::{
    new_debouncer_opt,
    notify::{RecursiveMode, Watcher},
    DebounceEventResult, DebouncedEventKind, Debouncer,
};
use pollster::block_on;
use wgpu::{PollType, RenderPipeline};

const SHADER_FOLDER: &str = "assets/shaders";
const SHARED_SHADER_MODULES_FOLDER: &str = "assets/shaders/shared";

pub type PipelineFactory = Box<
    dyn Sync
        + Send
        + Fn(&wgpu::Device, &ShaderDefinition, &str) -> anyhow::Result<wgpu::RenderPipeline>,
>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShaderDefinition {
    pub name: &'static str,
    /// Relative to the shader folder.
    pub path: &'static str,
}

impl ShaderDefinition {
    fn full_path(&self) -> PathBuf {
        Path::new(SHADER_FOLDER).join(self.path)
    }
}

pub struct ShaderEntry {
    pipeline_id: PipelineId,
    def: ShaderDefinition,
    factory: PipelineFactory,
}

pub type PipelineId = Id<PipelineCacheEntry>;

#[derive(Default)]
pub struct PipelineCacheEntry(Option<wgpu::RenderPipeline>);

impl PipelineCacheEntry {
    pub fn set_pipeline(&mut self, pipeline: wgpu::RenderPipeline) {
        self.0 = Some(pipeline);
    }
}

pub struct PipelineCacheBuilder {
    shaders: Arena<ShaderEntry>,
    pipelines: Arena<PipelineCacheEntry>,
}

impl PipelineCacheBuilder {
    pub fn new() -> Self {
        Self {
            shaders: Arena::new(),
            pipelines: Arena::new(),
        }
    }

    pub fn add_shader(
        &mut self,
        shader_def: ShaderDefinition,
        factory: PipelineFactory,
    ) -> PipelineId {
        let pipeline_id = self.pipelines.alloc(PipelineCacheEntry::default());
        self.shaders.alloc(ShaderEntry {
            pipeline_id,
            def: shader_def,
            factory,
        });
        pipeline_id
    }

    pub fn build(self) -> PipelineCache {
        PipelineCache {
            shaders: Arc::new(self.shaders),
            pipelines: self.pipelines,
        }
    }
}

pub struct PipelineCache {
    shaders: Arc<Arena<ShaderEntry>>,
    pipelines: Arena<PipelineCacheEntry>,
}

impl PipelineCache {
    pub fn get(&self, id: PipelineId) -> Option<&RenderPipeline> {
        self.pipelines.get(id).and_then(|entry| entry.0.as_ref())
    }

    fn get_entry_mut(&mut self, id: PipelineId) -> Option<&mut PipelineCacheEntry> {
        self.pipelines.get_mut(id)
    }
}

type ReloadedPipeline = (&'static str, PipelineId, wgpu::RenderPipeline);

/// Compiles registered shaders into pipelines and recompiles them on a watcher thread
/// when their source files change.
pub struct ShaderLoader {
    pub cache: PipelineCache,
    device: wgpu::Device,
    receiver: mpsc::Receiver<ReloadedPipeline>,
    composer: Arc<RwLock<Composer>>,
    _debouncer: Option<Debouncer<notify_debouncer_mini::notify::RecommendedWatcher>>,
}

impl ShaderLoader {
    pub fn new(
        device: wgpu::Device,
        cache_builder: PipelineCacheBuilder,
        watch: bool,
    ) -> anyhow::Result<Self> {
        let cache = cache_builder.build();

        let (send_new_pipelines, recv_new_pipelines) = channel();

        let composer = create_composer().context("Failed to create shader composer")?;
        let composer = Arc::new(RwLock::new(composer));

        let debouncer = if watch {
            Some(watch_shader_folder(
                device.clone(),
                cache.shaders.clone(),
                composer.clone(),
                send_new_pipelines,
            )?)
        } else {
            None
        };

        let mut shader_loader = Self {
            device,
            cache,
            receiver: recv_new_pipelines,
            composer,
            _debouncer: debouncer,
        };

        shader_loader.create_all_pipelines()?;

        Ok(shader_loader)
    }

    fn create_all_pipelines(&mut self) -> anyhow::Result<()> {
        for (_, shader) in self.cache.shaders.clone().iter() {
            let pipeline = compile_file(&self.device, &shader.def, &shader.factory, &self.composer)
                .with_context(|| format!("Failed to compile shader: {}", shader.def.name))?;

            if let Some(entry) = self.cache.get_entry_mut(shader.pipeline_id) {
                entry.set_pipeline(pipeline);
            }
        }
        Ok(())
    }

    /// Swaps in pipelines recompiled by the watcher since the last call.
    pub fn load_pending_shaders(&mut self) {
        while let Ok((name, pipeline_id, pipeline)) = self.receiver.try_recv() {
            if let Some(entry) = self.cache.get_entry_mut(pipeline_id) {
                log::info!("Shader reloaded: {}", name);
                entry.set_pipeline(pipeline);
            }
        }
    }
}

fn watch_shader_folder(
    device: wgpu::Device,
    shaders: Arc<Arena<ShaderEntry>>,
    composer: Arc<RwLock<Composer>>,
    sender: mpsc::Sender<ReloadedPipeline>,
) -> anyhow::Result<Debouncer<notify_debouncer_mini::notify::RecommendedWatcher>> {
    let mut debouncer = new_debouncer_opt(
        notify_debouncer_mini::Config::default().with_timeout(Duration::from_millis(100)),
        move |res: DebounceEventResult| match res {
            Ok(events) => {
                for event in events {
                    if event.kind != DebouncedEventKind::Any {
                        continue;
                    }

                    let changed = shaders
                        .iter()
                        .map(|(_, entry)| entry)
                        .filter(|entry| event.path.ends_with(entry.def.path));

                    for entry in changed {
                        match compile_file(&device, &entry.def, &entry.factory, &composer) {
                            Ok(pipeline) => {
                                if sender
                                    .send((entry.def.name, entry.pipeline_id, pipeline))
                                    .is_err()
                                {
                                    log::debug!("Shader loader is gone, dropping reloaded shader");
                                }
                            }
                            Err(e) => {
                                log::error!("Failed to reload shader {}: {:#}", entry.def.name, e)
                            }
                        }
                    }
                }
            }
            Err(e) => log::error!("Error debouncing shader changes: {}", e),
        },
    )
    .context("Failed to create shader watcher")?;

    let absolute_shader_folder = Path::new(SHADER_FOLDER)
        .canonicalize()
        .with_context(|| format!("Shader folder {} not found", SHADER_FOLDER))?;

    debouncer
        .watcher()
        .watch(&absolute_shader_folder, RecursiveMode::Recursive)
        .context("Failed to watch shader folder")?;

    log::debug!("Watching {} for shader changes", absolute_shader_folder.display());

    Ok(debouncer)
}

fn compile_file(
    device: &wgpu::Device,
    shader_def: &ShaderDefinition,
    factory: &PipelineFactory,
    composer: &RwLock<Composer>,
) -> anyhow::Result<wgpu::RenderPipeline> {
    let path = shader_def.full_path();
    let shader_code = std::fs::read_to_string(&path)
        .with_context(|| format!("Failed to read shader file {}", path.display()))?;

    let shader_code = compose_wgsl(composer, &path, &shader_code)?;

    device.push_error_scope(wgpu::ErrorFilter::Validation);

    let pipeline = factory(device, shader_def, &shader_code);

    device
        .poll(PollType::Wait)
        .context("Failed to poll device after shader compilation.")?;

    if let Some(error) = block_on(device.pop_error_scope()) {
        return Err(anyhow::anyhow!(
            "Shader compilation failed for {}: {}",
            shader_def.name,
            error
        ));
    };

    pipeline
}

/// Resolves `#import`s against the shared modules and writes the result back out as plain WGSL.
fn compose_wgsl(
    composer: &RwLock<Composer>,
    path: &Path,
    source: &str,
) -> anyhow::Result<String> {
    let file_path = path.to_string_lossy().to_string();

    let module = {
        let mut composer = composer
            .write()
            .map_err(|_| anyhow::anyhow!("Shader composer lock poisoned"))?;

        composer
            .make_naga_module(NagaModuleDescriptor {
                file_path: &file_path,
                source,
                ..Default::default()
            })
            .with_context(|| format!("Failed to create Naga module from {}", file_path))?
    };

    // wgpu validates again when the module is created, this pass only feeds the writer.
    let info = naga::valid::Validator::new(ValidationFlags::empty(), Capabilities::all())
        .validate(&module)
        .context("Failed to validate Naga module")?;

    naga::back::wgsl::write_string(&module, &info, WriterFlags::empty())
        .context("Failed to convert Naga module to WGSL string")
}

fn create_composer() -> anyhow::Result<Composer> {
    let shared_files = std::fs::read_dir(SHARED_SHADER_MODULES_FOLDER).with_context(|| {
        format!(
            "Failed to read shared shader modules directory {}",
            SHARED_SHADER_MODULES_FOLDER
        )
    })?;
    let mut composer = Composer::default();

    for entry in shared_files {
        let path = entry
            .context("Failed to read entry in shared shader modules directory")?
            .path();

        if !path.is_file() || path.extension().map_or(true, |ext| ext != "wgsl") {
            continue;
        }

        let source = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read shared shader module {}", path.display()))?;

        let file_path = path.to_string_lossy().to_string();

        composer
            .add_composable_module(ComposableModuleDescriptor {
                source: &source,
                file_path: &file_path,
                language: ShaderLanguage::Wgsl,
                ..Default::default()
            })
            .with_context(|| format!("Failed to add shared shader module: {}", file_path))?;

        log::debug!("Added shared shader module {}", file_path);
    }

    Ok(composer)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::material::DEFAULT_SHADER;

    fn manifest_relative(path: &str) -> PathBuf {
        Path::new(env!("CARGO_MANIFEST_DIR")).join(path)
    }

    fn composer_from(folder: &Path) -> Composer {
        let mut composer = Composer::default();
        for entry in std::fs::read_dir(folder).unwrap() {
            let path = entry.unwrap().path();
            let source = std::fs::read_to_string(&path).unwrap();
            composer
                .add_composable_module(ComposableModuleDescriptor {
                    source: &source,
                    file_path: &path.to_string_lossy(),
                    language: ShaderLanguage::Wgsl,
                    ..Default::default()
                })
                .unwrap();
        }
        composer
    }

    #[test]
    fn default_shader_composes_with_shared_modules() {
        let composer = RwLock::new(composer_from(&manifest_relative(SHARED_SHADER_MODULES_FOLDER)));
        let path = manifest_relative(SHADER_FOLDER).join(DEFAULT_SHADER.path);
        let source = std::fs::read_to_string(&path).unwrap();

        let wgsl = compose_wgsl(&composer, &path, &source).unwrap();

        assert!(wgsl.contains("fn vs_main"));
        assert!(wgsl.contains("fn fs_main"));
        assert!(!wgsl.contains("#import"));
    }

    #[test]
    fn broken_shader_is_an_error() {
        let composer = RwLock::new(composer_from(&manifest_relative(SHARED_SHADER_MODULES_FOLDER)));
        let path = PathBuf::from("broken.wgsl");

        assert!(compose_wgsl(&composer, &path, "fn fs_main( -> {").is_err());
    }
}
