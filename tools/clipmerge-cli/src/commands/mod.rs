pub mod check;
pub mod classify;
pub mod info;
pub mod merge;
pub mod plan;
pub mod probe;

use std::path::Path;

use clipmerge_export::probe_clip;
use clipmerge_media_model::ClipDescriptor;

/// Read a clip from a descriptor `.json` file, or probe it as media.
pub fn load_clip(path: &Path) -> anyhow::Result<ClipDescriptor> {
    let is_descriptor = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));

    tracing::debug!(path = %path.display(), descriptor = is_descriptor, "Loading clip");
    if is_descriptor {
        ClipDescriptor::load(path)
            .map_err(|e| anyhow::anyhow!("Failed to load clip descriptor: {e}"))
    } else {
        probe_clip(path).map_err(|e| anyhow::anyhow!("Failed to probe clip: {e}"))
    }
}
