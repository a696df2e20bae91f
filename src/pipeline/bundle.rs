// src/pipeline/bundle.rs

use crate::engine::InputFailure;
use crate::fs::FileSystem;
use crate::pipeline::{apply_steps, deporder, write_artifact};
use crate::step::Asset;
use crate::task::Task;
use crate::types::ConcatOrder;

/// Separator placed between concatenated inputs.
pub const NEWLINE: &[u8] = b"\n";

/// Join the asset contents in order, separated by a newline.
pub fn concatenate(assets: &[Asset]) -> Vec<u8> {
    let total: usize = assets.iter().map(|a| a.contents.len() + NEWLINE.len()).sum();
    let mut out = Vec::with_capacity(total);
    for (i, asset) in assets.iter().enumerate() {
        if i > 0 {
            out.extend_from_slice(NEWLINE);
        }
        out.extend_from_slice(&asset.contents);
    }
    out
}

/// Concatenate the processed inputs of a bundle task, run the bundle steps
/// and write the bundle artifacts.
///
/// `assets` must be in selector order. A failure is reported against the
/// bundle's destination path.
pub async fn build_bundle(
    task: &Task,
    assets: Vec<Asset>,
    fs: &dyn FileSystem,
) -> Result<(), InputFailure> {
    let Some(bundle) = task.bundle() else {
        return Ok(());
    };
    let failure = |message: String| {
        InputFailure::new(task.destination().artifact(&bundle.file), message)
    };

    let ordered = match bundle.order {
        ConcatOrder::Path => assets,
        ConcatOrder::Requires => deporder::order_by_requires(assets),
    };
    let Some(first) = ordered.first() else {
        return Ok(());
    };

    let joined = Asset::new(first.source.clone(), bundle.file.clone(), concatenate(&ordered));
    let (asset, written) = apply_steps(&bundle.steps, joined, task.destination(), fs)
        .await
        .map_err(|e| failure(e.to_string()))?;
    if !written {
        write_artifact(fs, task.destination(), &asset).map_err(|e| failure(e.to_string()))?;
    }
    Ok(())
}
