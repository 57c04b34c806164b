//! Extensions that ship with the host.

pub mod metatool;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use videoinsight_av::TagEditor;

use super::catalog::{BuiltinCatalog, BundledManifest};

pub(crate) fn register_all(catalog: &mut BuiltinCatalog, ffmpeg: PathBuf, tag_timeout: Duration) {
    let editor = Arc::new(TagEditor::new(ffmpeg).with_timeout(tag_timeout));
    catalog.register_bundled(
        metatool::KEY,
        BundledManifest {
            file_name: format!("{}.ext", metatool::KEY),
            contents: metatool::MANIFEST.to_string(),
        },
        move || Box::new(metatool::MetaTool::new(Arc::clone(&editor))),
    );
}
