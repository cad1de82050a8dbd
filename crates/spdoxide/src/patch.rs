//! Copy byte selections between SPD images with checksum repair.
//!
//! A patch is planned first ([`PatchEngine::plan`]), which records every fact
//! the safety checks need, then applied ([`PatchEngine::apply`]), which
//! enforces the checks, copies into a fresh buffer, rewrites the affected
//! checksums and hands the result to a [`PatchSink`] exactly once.

use crate::crc::{self, CrcCheckResult};
use crate::decoders::{DecodedImage, SpdDecoder};
use crate::field::ByteSpan;
use crate::image::{ByteSource, SpdError, SpdResult, Warning};
use crate::profile::Classification;
use crate::record::ModuleRecord;
use crate::rules::crc_rules::slots_for;
use crate::rules::selections::{find_selection, hp_tag_offset, is_hp_manufacturer, HP_TAG};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::{debug, info, warn};

/// What to copy from the source image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selection {
    /// A named selection such as `hp` or `vendor`.
    Named(String),
    /// An inclusive byte range.
    Range { start: usize, end: usize },
}

impl FromStr for Selection {
    type Err = SpdError;

    /// `hp`, `vendor`, `176-191` or `176..=191`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let bounds = s.split_once("..=").or_else(|| s.split_once('-'));
        if let Some((a, b)) = bounds {
            if let (Ok(start), Ok(end)) = (a.trim().parse::<usize>(), b.trim().parse::<usize>()) {
                if start > end {
                    return Err(SpdError::InvalidParameter(format!("empty range {}", s)));
                }
                return Ok(Selection::Range { start, end });
            }
        }
        if s.is_empty() {
            return Err(SpdError::InvalidParameter("empty selection".into()));
        }
        Ok(Selection::Named(s.to_ascii_lowercase()))
    }
}

impl fmt::Display for Selection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Selection::Named(name) => f.write_str(name),
            Selection::Range { start, end } => write!(f, "{}..={}", start, end),
        }
    }
}

/// Destination for a patched image. Written once, after every check passed.
pub trait PatchSink {
    fn write_image(&mut self, bytes: &[u8]) -> SpdResult<()>;
}

impl PatchSink for Vec<u8> {
    fn write_image(&mut self, bytes: &[u8]) -> SpdResult<()> {
        self.clear();
        self.extend_from_slice(bytes);
        Ok(())
    }
}

/// Writes the patched image to a file.
pub struct FileSink {
    path: PathBuf,
}

impl FileSink {
    pub fn new(path: impl AsRef<Path>) -> Self {
        FileSink {
            path: path.as_ref().to_path_buf(),
        }
    }
}

impl PatchSink for FileSink {
    fn write_image(&mut self, bytes: &[u8]) -> SpdResult<()> {
        std::fs::write(&self.path, bytes)?;
        info!("Wrote patched image to {}", self.path.display());
        Ok(())
    }
}

/// Everything decided before any byte is copied.
#[derive(Debug, Clone)]
pub struct PatchPlan {
    /// Human-readable selection label.
    pub label: String,
    pub span: ByteSpan,
    /// Bytes to write at `span`.
    pub payload: Vec<u8>,
    pub target: ByteSource,
    pub source_class: Classification,
    pub target_class: Classification,
    pub generation_match: bool,
    pub sub_type_match: bool,
    /// The selection is HP-specific.
    pub hp_selection: bool,
    /// Target is HP-made or already carries an HP tag.
    pub target_is_hp: bool,
    /// Checksum slots whose coverage or stored bytes overlap `span`.
    pub affected_slots: Vec<&'static str>,
    /// `span` includes stored checksum bytes.
    pub touches_checksum: bool,
    /// Target checksum state before the patch.
    pub crc_before: Vec<CrcCheckResult>,
}

/// Result of a successful apply.
#[derive(Debug, Clone)]
pub struct PatchOutcome {
    pub output: ByteSource,
    /// Checksums rewritten, by slot name.
    pub rewritten: Vec<(String, u16)>,
    /// Post-patch validation of every slot.
    pub crc: Vec<CrcCheckResult>,
    pub warnings: Vec<Warning>,
}

/// Plans and applies patches.
#[derive(Default)]
pub struct PatchEngine {
    decoder: SpdDecoder,
}

impl PatchEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use a configured decoder (vendor table, strictness) for target checks.
    pub fn with_decoder(decoder: SpdDecoder) -> Self {
        PatchEngine { decoder }
    }

    /// Plan copying `selection` from `source` into `target`.
    pub fn plan(
        &self,
        source: &DecodedImage,
        target: &ByteSource,
        selection: &Selection,
    ) -> SpdResult<PatchPlan> {
        let source_class = self.decoder.classify(&source.source)?;
        let target_class = self.decoder.classify(target)?;
        if source_class.generation != target_class.generation {
            return Err(SpdError::incompatible(format!(
                "source is {}, target is {}",
                source_class.generation, target_class.generation
            )));
        }

        let generation = source_class.generation;
        let (span, hp_selection) = match selection {
            Selection::Named(name) => {
                let named = find_selection(generation, name).ok_or_else(|| {
                    SpdError::InvalidParameter(format!("no '{}' selection for {}", name, generation))
                })?;
                (named.span(), named.hp)
            }
            Selection::Range { start, end } if start <= end => (ByteSpan::new(*start, *end), false),
            Selection::Range { start, end } => {
                return Err(SpdError::InvalidParameter(format!("empty range {}..={}", start, end)));
            }
        };
        if span.end >= source.source.len() {
            return Err(SpdError::out_of_range(span.start, span.len(), source.source.len()));
        }

        let payload = source.source.read(span.start, span.len())?.to_vec();
        self.build_plan(selection.to_string(), span, payload, hp_selection, source_class, target)
    }

    /// Plan writing `HPT\0` plus `code` into the target's HP block.
    pub fn plan_set_hp_code(&self, target: &ByteSource, code: [u8; 4]) -> SpdResult<PatchPlan> {
        let class = self.decoder.classify(target)?;
        let offset = hp_tag_offset(class.generation).ok_or_else(|| {
            SpdError::InvalidParameter(format!("{} has no HP SmartMemory block", class.generation))
        })?;
        let mut payload = HP_TAG.to_vec();
        payload.extend_from_slice(&code);
        let span = ByteSpan::new(offset, offset + payload.len() - 1);
        self.build_plan(
            format!("set-hp-code {:02X}{:02X}{:02X}{:02X}", code[0], code[1], code[2], code[3]),
            span,
            payload,
            true,
            class,
            target,
        )
    }

    fn build_plan(
        &self,
        label: String,
        span: ByteSpan,
        payload: Vec<u8>,
        hp_selection: bool,
        source_class: Classification,
        target: &ByteSource,
    ) -> SpdResult<PatchPlan> {
        if span.end >= target.len() {
            return Err(SpdError::out_of_range(span.start, span.len(), target.len()));
        }
        let target_record = self.decoder.decode(target)?;
        let target_class = self.decoder.classify(target)?;
        let generation_match = source_class.generation == target_class.generation;

        let mut affected_slots = Vec::new();
        let mut touches_checksum = false;
        for slot in slots_for(target_class.generation) {
            let stored = slot.stored_span();
            touches_checksum |= stored.overlaps(&span);
            let covered = slot.variants.iter().any(|rule| rule.span().overlaps(&span));
            if covered || stored.overlaps(&span) {
                affected_slots.push(slot.name);
            }
        }

        let plan = PatchPlan {
            label,
            span,
            payload,
            target: target.clone(),
            source_class,
            target_class,
            generation_match,
            sub_type_match: source_class.sub_type == target_class.sub_type,
            hp_selection,
            target_is_hp: is_hp_module(&target_record),
            affected_slots,
            touches_checksum,
            crc_before: target_record.crc.clone(),
        };
        debug!(
            "Patch plan {} {}: affected slots {:?}, touches checksum bytes: {}",
            plan.label, plan.span, plan.affected_slots, plan.touches_checksum
        );
        Ok(plan)
    }

    /// Run the checks, copy, repair checksums, validate and write once.
    pub fn apply(&self, plan: &PatchPlan, sink: &mut dyn PatchSink, force: bool) -> SpdResult<PatchOutcome> {
        let mut warnings = Vec::new();

        if !plan.generation_match {
            return Err(SpdError::incompatible(format!(
                "source is {}, target is {}",
                plan.source_class.generation, plan.target_class.generation
            )));
        }

        let mut check = |ok: bool, message: String| -> SpdResult<()> {
            if ok {
                return Ok(());
            }
            if !force {
                return Err(SpdError::incompatible(message));
            }
            warn!("Forced past check: {}", message);
            warnings.push(Warning::PatchForced { message });
            Ok(())
        };
        check(
            plan.sub_type_match,
            format!(
                "source is {}, target is {}",
                plan.source_class.sub_type, plan.target_class.sub_type
            ),
        )?;
        check(
            !plan.hp_selection || plan.target_is_hp,
            "target is neither HP-made nor HP-tagged".to_string(),
        )?;

        let generation = plan.target_class.generation;
        let mut bytes = plan.target.as_bytes().to_vec();
        let dst = bytes
            .get_mut(plan.span.start..=plan.span.end)
            .filter(|dst| dst.len() == plan.payload.len())
            .ok_or_else(|| {
                SpdError::InvalidParameter(format!(
                    "payload of {} bytes does not fit {}",
                    plan.payload.len(),
                    plan.span
                ))
            })?;
        dst.copy_from_slice(&plan.payload);

        let mut rewritten = Vec::new();
        for slot in slots_for(generation).filter(|s| plan.affected_slots.contains(&s.name)) {
            let value = crc::rewrite(slot, &mut bytes);
            debug!("Rewrote checksum {} = {:#06x}", slot.name, value);
            rewritten.push((slot.name.to_string(), value));
        }

        // Rewritten slots must pass under their declared coverage; untouched
        // slots only need some coverage variant to pass, as on decode.
        let results = crc::validate_slots(&bytes, slots_for(generation), false);
        for slot in slots_for(generation) {
            let was_rewritten = plan.affected_slots.contains(&slot.name);
            if !was_rewritten && crc::slot_passes(&results, slot.name) {
                continue;
            }
            let declared = results.iter().find(|r| r.slot == slot.name && r.declared);
            if let Some(r) = declared.filter(|r| !r.passed) {
                if !force {
                    return Err(SpdError::PatchCrcInconsistency {
                        slot: r.slot.clone(),
                        stored: r.stored,
                        computed: r.computed,
                    });
                }
                let message = format!(
                    "checksum '{}' fails after patch: stored {:#06x}, computed {:#06x}",
                    r.slot, r.stored, r.computed
                );
                warn!("{}", message);
                warnings.push(Warning::PatchForced { message });
            }
        }

        let output = ByteSource::load(bytes)?;
        sink.write_image(output.as_bytes())?;
        info!(
            "Applied patch {} ({} bytes at {}), {} checksum(s) rewritten",
            plan.label,
            plan.payload.len(),
            plan.span,
            rewritten.len()
        );
        Ok(PatchOutcome {
            output,
            rewritten,
            crc: results,
            warnings,
        })
    }
}

/// HP-made (by JEP-106 ID) or already HP-tagged.
fn is_hp_module(record: &ModuleRecord) -> bool {
    record.has_hp_tag() || record.module_manufacturer.is_some_and(is_hp_manufacturer)
}
