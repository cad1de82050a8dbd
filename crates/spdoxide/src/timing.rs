//! Timing analysis: nanosecond and clock-cycle views, CAS cross-check and
//! JEDEC down-bins.

use crate::codec::ps_to_ns;
use crate::field::ByteSpan;
use crate::image::Warning;
use crate::profile::Generation;
use crate::rules::speed_bins::{bins_for, find_speed_bin, module_name_prefix};
use serde::Serialize;
use std::fmt;

/// A timing parameter as read from an image.
#[derive(Debug, Clone, PartialEq)]
pub struct TimingParam {
    pub name: &'static str,
    pub ps: i64,
    pub spans: Vec<ByteSpan>,
}

impl TimingParam {
    pub fn new(name: &'static str, ps: i64, spans: Vec<ByteSpan>) -> Self {
        TimingParam { name, ps, spans }
    }
}

/// One timing in both units.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TimingValue {
    pub name: String,
    pub ns: f64,
    pub clocks: u32,
}

/// CL-tRCD-tRP-tRAS in clocks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct PrimaryTimings {
    pub cl: u32,
    pub trcd: u32,
    pub trp: u32,
    pub tras: u32,
}

impl fmt::Display for PrimaryTimings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}-{}-{}", self.cl, self.trcd, self.trp, self.tras)
    }
}

/// Timings re-derived at a slower standard speed bin.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SpeedBinProfile {
    pub name: String,
    pub data_rate: u32,
    pub tck_ns: f64,
    pub timings: PrimaryTimings,
    /// False when no declared CAS latency covers the derived one.
    pub cl_supported: bool,
}

/// Derived timing view of a module.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TimingReport {
    pub tck_ns: f64,
    /// MT/s.
    pub data_rate: u32,
    pub module_name: String,
    pub cas_latencies: Vec<u32>,
    pub primary: PrimaryTimings,
    pub values: Vec<TimingValue>,
    pub down_bins: Vec<SpeedBinProfile>,
}

/// Analyzer input assembled by a generation decoder.
pub struct TimingInput<'a> {
    pub generation: Generation,
    pub tck_ps: i64,
    pub cas_latencies: Vec<u32>,
    /// Cross-check `tAA / tCK` against `cas_latencies`. Off when tAA is
    /// itself derived from the CAS latency.
    pub check_cas: bool,
    /// Must name `tAA`, `tRCD`, `tRP` and `tRAS`; extra parameters are
    /// converted as well.
    pub params: &'a [TimingParam],
    /// 1.35 V operable (DDR3 `PC3L` naming).
    pub low_voltage: bool,
}

/// Clock count for a minimum time, using the JEDEC integer rounding rule
/// (round up with a 2.5% guard band).
pub fn clock_cycles(t_ps: i64, tck_ps: i64) -> u32 {
    if tck_ps <= 0 || t_ps <= 0 {
        return 0;
    }
    let scaled = t_ps * 1000 / tck_ps;
    ((scaled + 974) / 1000) as u32
}

/// Data rate for a clock period, snapped to the nearest standard bin.
pub fn data_rate(generation: Generation, tck_ps: i64) -> u32 {
    if tck_ps <= 0 {
        return 0;
    }
    match find_speed_bin(generation, tck_ps) {
        Some(bin) => bin.data_rate,
        None => ((2_000_000 + tck_ps / 2) / tck_ps) as u32,
    }
}

/// JEDEC module name, e.g. `PC3-12800` or `PC3L-10600`.
pub fn module_name(generation: Generation, data_rate: u32, low_voltage: bool) -> String {
    let suffix = if low_voltage && generation == Generation::Ddr3 { "L" } else { "" };
    let bandwidth = data_rate * 8 / 100 * 100;
    format!("{}{}-{}", module_name_prefix(generation), suffix, bandwidth)
}

fn param(params: &[TimingParam], name: &str) -> i64 {
    params.iter().find(|p| p.name == name).map_or(0, |p| p.ps)
}

fn primary_at(params: &[TimingParam], tck_ps: i64) -> PrimaryTimings {
    PrimaryTimings {
        cl: clock_cycles(param(params, "tAA"), tck_ps),
        trcd: clock_cycles(param(params, "tRCD"), tck_ps),
        trp: clock_cycles(param(params, "tRP"), tck_ps),
        tras: clock_cycles(param(params, "tRAS"), tck_ps),
    }
}

/// Build the timing report and collect inconsistency warnings.
pub fn analyze(input: &TimingInput<'_>) -> (TimingReport, Vec<Warning>) {
    let mut warnings = Vec::new();
    let tck_ps = input.tck_ps;
    let rate = data_rate(input.generation, tck_ps);

    if tck_ps <= 0 {
        warnings.push(Warning::TimingInconsistency {
            message: "tCKmin is zero; clock-based timings unavailable".into(),
        });
    }

    let primary = primary_at(input.params, tck_ps);
    if input.check_cas
        && tck_ps > 0
        && !input.cas_latencies.is_empty()
        && !input.cas_latencies.contains(&primary.cl)
    {
        warnings.push(Warning::TimingInconsistency {
            message: format!(
                "CL{} derived from tAA {} ns / tCK {} ns is not in the declared CAS latencies {:?}",
                primary.cl,
                ps_to_ns(param(input.params, "tAA")),
                ps_to_ns(tck_ps),
                input.cas_latencies
            ),
        });
    }

    let values = input
        .params
        .iter()
        .map(|p| TimingValue {
            name: p.name.to_string(),
            ns: ps_to_ns(p.ps),
            clocks: clock_cycles(p.ps, tck_ps),
        })
        .collect();

    let down_bins = if tck_ps > 0 {
        bins_for(input.generation)
            .filter(|bin| i64::from(bin.tck_ps) > tck_ps && bin.data_rate < rate)
            .map(|bin| {
                let bin_tck = i64::from(bin.tck_ps);
                let mut timings = primary_at(input.params, bin_tck);
                let supported = input.cas_latencies.iter().copied().filter(|&cl| cl >= timings.cl).min();
                let cl_supported = supported.is_some() || input.cas_latencies.is_empty();
                if let Some(cl) = supported {
                    timings.cl = cl;
                }
                SpeedBinProfile {
                    name: format!("{}-{}", input.generation, bin.data_rate),
                    data_rate: bin.data_rate,
                    tck_ns: ps_to_ns(bin_tck),
                    timings,
                    cl_supported,
                }
            })
            .collect()
    } else {
        Vec::new()
    };

    let report = TimingReport {
        tck_ns: ps_to_ns(tck_ps),
        data_rate: rate,
        module_name: module_name(input.generation, rate, input.low_voltage),
        cas_latencies: input.cas_latencies.clone(),
        primary,
        values,
        down_bins,
    };
    (report, warnings)
}
