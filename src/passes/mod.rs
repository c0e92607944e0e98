//! The DOM post-processing pipeline driver.
//!
//! Passes run strictly in list order. Each entry declares a tracing
//! shortcut, whether it only runs at top level, and whether it is compiled
//! out. An error from any pass is fatal for the document: post-processing
//! stops and the partial DOM is not emitted.

use crate::{
    dom::{Document, serialize},
    env::Env,
    pipeline::{Error, PipelineOpts, Result},
};
use std::time::Instant;

pub(crate) mod cleanup;
pub(crate) mod dsr;
pub(crate) mod fixups;
pub(crate) mod fostered;
pub(crate) mod headings;
pub(crate) mod langconv;
pub(crate) mod linkclasses;
pub(crate) mod media;
pub(crate) mod migrate;
pub(crate) mod normalize;
pub(crate) mod pwrap;
pub(crate) mod sections;
pub(crate) mod tplwrap;
pub(crate) mod unpack;

/// The signature every pass implements. `at_top_level` distinguishes the
/// root document from nested fragment pipelines.
type PassFn = fn(&mut Document, &Env<'_>, &PipelineOpts, bool) -> Result;

/// One entry in the pass list.
struct PassSpec {
    /// Tracing and dump id.
    shortcut: &'static str,
    /// Run only for the top-level document.
    skip_nested: bool,
    /// Compile-time disabled.
    omit: bool,
    /// The pass body.
    run: PassFn,
}

/// The linter slot. Disabled; the linter is an external collaborator.
fn linter(_doc: &mut Document, _env: &Env<'_>, _opts: &PipelineOpts, _top: bool) -> Result {
    Ok(())
}

/// Runs every registered extension’s DOM post-processor, in registration
/// order. Relative ordering between extensions is otherwise unspecified;
/// processors are expected to be idempotent.
fn extension_post_processors(
    doc: &mut Document,
    env: &Env<'_>,
    _opts: &PipelineOpts,
    _top: bool,
) -> Result {
    for ext in &env.conf.extensions {
        if let Some(pp) = ext.post_processor {
            pp(doc, env)?;
        }
    }
    Ok(())
}

/// The ordered pass list. The order is authoritative: fostered marking must
/// precede DSR reasoning, marker migration must follow fixups, fragment
/// unpacking must precede extension post-processors, and cleanup runs last
/// before red-link annotation.
const PASSES: &[PassSpec] = &[
    PassSpec { shortcut: "fostered", skip_nested: false, omit: false, run: fostered::mark_fostered_content },
    PassSpec { shortcut: "tb-fixups", skip_nested: false, omit: false, run: normalize::tree_builder_fixups },
    PassSpec { shortcut: "normalize", skip_nested: false, omit: false, run: normalize::normalize },
    PassSpec { shortcut: "pwrap", skip_nested: true, omit: false, run: pwrap::wrap_stray_inline },
    PassSpec { shortcut: "migrate-metas", skip_nested: false, omit: false, run: migrate::migrate_template_marker_metas },
    PassSpec { shortcut: "pres", skip_nested: false, omit: false, run: migrate::normalize_pres },
    PassSpec { shortcut: "migrate-nls", skip_nested: false, omit: false, run: migrate::migrate_trailing_newlines },
    PassSpec { shortcut: "dsr", skip_nested: true, omit: false, run: dsr::compute_dsr },
    PassSpec { shortcut: "tplwrap", skip_nested: true, omit: false, run: tplwrap::wrap_templates },
    PassSpec { shortcut: "unpack", skip_nested: false, omit: false, run: unpack::unpack_dom_fragments },
    PassSpec { shortcut: "ext-pp", skip_nested: false, omit: false, run: extension_post_processors },
    PassSpec { shortcut: "fixups", skip_nested: true, omit: false, run: fixups::fix_lists_tables_styles },
    PassSpec { shortcut: "media", skip_nested: false, omit: false, run: media::add_media_info },
    PassSpec { shortcut: "headings", skip_nested: false, omit: false, run: headings::generate_anchors },
    PassSpec { shortcut: "sections", skip_nested: true, omit: false, run: sections::wrap_sections },
    PassSpec { shortcut: "heading-ids", skip_nested: false, omit: false, run: headings::dedupe_heading_ids },
    PassSpec { shortcut: "langconv", skip_nested: true, omit: false, run: langconv::convert_variants },
    PassSpec { shortcut: "linter", skip_nested: true, omit: true, run: linter },
    PassSpec { shortcut: "strip-metas", skip_nested: false, omit: false, run: cleanup::strip_marker_metas },
    PassSpec { shortcut: "linkclasses", skip_nested: true, omit: false, run: linkclasses::add_external_link_classes },
    PassSpec { shortcut: "cleanup", skip_nested: false, omit: false, run: cleanup::cleanup_and_save },
    PassSpec { shortcut: "redlinks", skip_nested: true, omit: false, run: linkclasses::add_red_links },
];

/// Dumps the DOM around a pass when requested via `--dump`.
fn maybe_dump(doc: &Document, env: &Env<'_>, shortcut: &str, which: &str) {
    if !env.options.dump.iter().any(|d| d == shortcut) {
        return;
    }
    let path = format!("dump-{shortcut}-{which}.html");
    if let Err(err) = std::fs::write(&path, serialize::serialize_document(doc)) {
        log::warn!("could not write {path}: {err}");
    }
}

/// Runs the pass list over a document.
pub(crate) fn run(
    doc: &mut Document,
    env: &Env<'_>,
    opts: &PipelineOpts,
    at_top_level: bool,
) -> Result {
    for pass in PASSES {
        if pass.omit || (pass.skip_nested && !at_top_level) {
            continue;
        }

        maybe_dump(doc, env, pass.shortcut, "pre");
        let started = env.options.trace_time.then(Instant::now);
        (pass.run)(doc, env, opts, at_top_level).map_err(|err| {
            log::error!("fatal error in pass {}: {err}", pass.shortcut);
            Error::Pass {
                pass: pass.shortcut,
                err: Box::new(err),
            }
        })?;
        if let Some(started) = started {
            log::trace!(
                target: "trace/time",
                "pass {} took {:?}",
                pass.shortcut,
                started.elapsed()
            );
        }
        maybe_dump(doc, env, pass.shortcut, "post");
    }
    Ok(())
}
