//! Media info addition: batch-resolves every image resource on the page
//! and stamps dimensions and URLs onto the `<img>` elements.

use crate::{
    dom::{Document, NodeId},
    env::Env,
    pipeline::{PipelineOpts, Result},
};

/// Fills in media metadata for `mw:Image` figures.
pub(crate) fn add_media_info(
    doc: &mut Document,
    env: &Env<'_>,
    _opts: &PipelineOpts,
    _at_top_level: bool,
) -> Result {
    let Some(body) = doc.body() else {
        return Ok(());
    };

    let mut images = vec![];
    collect_images(doc, body, &mut images);
    if images.is_empty() {
        return Ok(());
    }

    let titles: Vec<String> = images
        .iter()
        .filter_map(|&img| doc.attr(img, "resource"))
        .map(|r| r.trim_start_matches("./").to_string())
        .collect();
    let info = env.data.media_info(&titles)?;

    for img in images {
        let Some(title) = doc
            .attr(img, "resource")
            .map(|r| r.trim_start_matches("./").to_string())
        else {
            continue;
        };
        let Some(media) = info.get(&title) else {
            log::debug!("no media info for {title}");
            continue;
        };
        doc.set_attr(img, "src", media.url.clone());
        if let Some(width) = media.width {
            doc.set_attr(img, "width", width.to_string());
        }
        if let Some(height) = media.height {
            doc.set_attr(img, "height", height.to_string());
        }
    }
    Ok(())
}

/// Collects `img` elements inside `mw:Image` figures.
fn collect_images(doc: &Document, node: NodeId, out: &mut Vec<NodeId>) {
    if doc.is_element_named(node, "img") {
        out.push(node);
    }
    for child in doc.children(node) {
        collect_images(doc, child, out);
    }
}
