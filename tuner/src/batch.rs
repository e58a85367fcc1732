//! Parallel evaluation of many configurations: the seam an external search
//! engine drives. Results are matched to configurations by index, never by
//! completion order.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use smb_core::{
    Configuration, Encoding, FitnessFunction, MovieOptions, ParamDomain, ParamValue,
    ParameterSpace, RepresentationKind,
};

use crate::emulator::Emulator;
use crate::harness::{EvaluationResult, EvaluationState, Harness};
use crate::history::HistoryStore;
use crate::util::{now_unix_s, write_output};

pub struct BatchConfig<'a> {
    pub configurations: Vec<Configuration>,
    pub jobs: Option<usize>,
    pub out_dir: Option<PathBuf>,
    /// Record every configuration and result under this tuning run.
    pub history: Option<(&'a HistoryStore, i64)>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BatchRecord {
    pub index: usize,
    pub state: EvaluationState,
    pub score: Option<f64>,
    pub won: Option<bool>,
    pub x_pos: Option<u32>,
    pub frames: Option<u32>,
    pub was_new_best: bool,
    pub configuration_id: Option<i64>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BatchReport {
    pub generated_unix_s: u64,
    pub representation: RepresentationKind,
    pub fitness: FitnessFunction,
    pub jobs: Option<usize>,
    pub tuning_run: Option<i64>,
    pub run_count: usize,
    pub ok_count: usize,
    pub error_count: usize,
    pub best_index: Option<usize>,
    pub best_score: Option<f64>,
    pub records: Vec<BatchRecord>,
}

pub fn run_batch<E: Emulator>(harness: &Harness<E>, config: BatchConfig<'_>) -> Result<BatchReport> {
    if config.configurations.is_empty() {
        return Err(anyhow!("batch requires at least one configuration"));
    }
    if let Some(jobs) = config.jobs {
        if jobs == 0 {
            return Err(anyhow!("batch --jobs must be >= 1 when provided"));
        }
    }
    if let Some(out_dir) = &config.out_dir {
        fs::create_dir_all(out_dir)
            .with_context(|| format!("failed creating {}", out_dir.display()))?;
    }

    tracing::info!(
        configurations = config.configurations.len(),
        representation = harness.representation().id(),
        fitness = harness.fitness().as_str(),
        "starting batch"
    );

    let evaluate = |cfg: &Configuration| harness.evaluate(cfg);
    let results: Vec<EvaluationResult> = if let Some(jobs) = config.jobs {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(jobs)
            .build()
            .context("failed to build rayon threadpool")?;
        pool.install(|| config.configurations.par_iter().map(evaluate).collect())
    } else {
        config.configurations.par_iter().map(evaluate).collect()
    };

    let mut records = Vec::with_capacity(results.len());
    let mut best: Option<(usize, f64)> = None;
    for (index, (cfg, result)) in config.configurations.iter().zip(&results).enumerate() {
        let was_new_best =
            result.is_ok() && best.map_or(true, |(_, best_score)| result.score < best_score);
        if was_new_best {
            best = Some((index, result.score));
        }

        let configuration_id = match config.history {
            Some((store, run_id)) => {
                let cfg_id = store.record_configuration(cfg)?;
                store.record_result(run_id, cfg_id, result, was_new_best)?;
                Some(cfg_id)
            }
            None => None,
        };

        records.push(BatchRecord {
            index,
            state: result.state,
            score: result.is_ok().then_some(result.score),
            won: result.outcome.map(|o| o.won()),
            x_pos: result.outcome.map(|o| o.x_pos),
            frames: result.outcome.map(|o| o.frames),
            was_new_best,
            configuration_id,
        });
    }

    let ok_count = results.iter().filter(|r| r.is_ok()).count();
    let report = BatchReport {
        generated_unix_s: now_unix_s(),
        representation: harness.representation().kind(),
        fitness: harness.fitness(),
        jobs: config.jobs,
        tuning_run: config.history.map(|(_, run_id)| run_id),
        run_count: records.len(),
        ok_count,
        error_count: records.len() - ok_count,
        best_index: best.map(|(index, _)| index),
        best_score: best.map(|(_, score)| score),
        records,
    };

    if let Some(out_dir) = &config.out_dir {
        write_results_csv(&out_dir.join("results.csv"), &report.records)?;
        if let Some(index) = report.best_index {
            let events = harness.decode(&config.configurations[index])?;
            let movie = harness.movie(&events, &MovieOptions::full());
            write_output(&out_dir.join("best.fm2"), movie)?;
        }
        let summary = serde_json::to_vec_pretty(&report).context("failed to serialize summary json")?;
        write_output(&out_dir.join("summary.json"), summary)?;
    }

    tracing::info!(
        ok = report.ok_count,
        errors = report.error_count,
        best_score = report.best_score,
        "batch finished"
    );
    Ok(report)
}

fn write_results_csv(path: &Path, rows: &[BatchRecord]) -> Result<()> {
    let mut csv =
        String::from("index,state,score,won,x_pos,frames,was_new_best,configuration_id\n");
    let opt = |value: Option<String>| value.unwrap_or_default();
    for row in rows {
        csv.push_str(&format!(
            "{},{},{},{},{},{},{},{}\n",
            row.index,
            row.state.as_str(),
            opt(row.score.map(|v| v.to_string())),
            opt(row.won.map(|v| v.to_string())),
            opt(row.x_pos.map(|v| v.to_string())),
            opt(row.frames.map(|v| v.to_string())),
            row.was_new_best,
            opt(row.configuration_id.map(|v| v.to_string())),
        ));
    }
    write_output(path, csv)
}

/// Reads configurations from a JSON array or a JSON Lines file.
pub fn load_configurations(path: &Path) -> Result<Vec<Configuration>> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("failed reading configurations {}", path.display()))?;
    let configurations = if raw.trim_start().starts_with('[') {
        serde_json::from_str::<Vec<Configuration>>(&raw)
            .with_context(|| format!("invalid configuration array in {}", path.display()))?
    } else {
        let mut out = Vec::new();
        for (line_no, line) in raw.lines().enumerate() {
            let trimmed = line.trim();
            if trimmed.is_empty() || trimmed.starts_with('#') {
                continue;
            }
            out.push(serde_json::from_str(trimmed).with_context(|| {
                format!("invalid configuration at {}:{}", path.display(), line_no + 1)
            })?);
        }
        out
    };
    if configurations.is_empty() {
        return Err(anyhow!("{} had no configurations", path.display()));
    }
    Ok(configurations)
}

/// Uniformly random in-domain configurations, reproducible from `seed`.
pub fn sample_configurations(space: &ParameterSpace, count: usize, seed: u64) -> Vec<Configuration> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..count)
        .map(|_| {
            space
                .iter()
                .map(|param| {
                    let value = match &param.domain {
                        ParamDomain::Bool => ParamValue::Bool(rng.gen_bool(0.5)),
                        ParamDomain::Int { lo, hi } => ParamValue::Int(rng.gen_range(*lo..=*hi)),
                        ParamDomain::Enum { symbols } => {
                            ParamValue::Symbol(symbols[rng.gen_range(0..symbols.len())].clone())
                        }
                    };
                    (param.name.clone(), value)
                })
                .collect()
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn samples_stay_in_domain_and_repeat_per_seed() {
        let space = RepresentationKind::Duration.build(None).parameter_space();
        let first = sample_configurations(&space, 3, 7);
        assert_eq!(first.len(), 3);
        for cfg in &first {
            assert_eq!(space.check(cfg), Ok(()));
        }
        assert_eq!(sample_configurations(&space, 3, 7), first);
        assert_ne!(sample_configurations(&space, 3, 8), first);
    }

    #[test]
    fn loads_arrays_and_json_lines() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let array = dir.path().join("configs.json");
        fs::write(&array, r#"[{"mask0": 3}, {"mask0": "12"}]"#)?;
        assert_eq!(load_configurations(&array)?.len(), 2);

        let lines = dir.path().join("configs.jsonl");
        fs::write(&lines, "# seeds\n{\"mask0\": 1}\n\n{\"mask0\": 2}\n{\"mask0\": 4}\n")?;
        let loaded = load_configurations(&lines)?;
        assert_eq!(loaded.len(), 3);
        assert_eq!(loaded[2].int("mask0")?, 4);

        let empty = dir.path().join("empty.jsonl");
        fs::write(&empty, "\n")?;
        assert!(load_configurations(&empty).is_err());

        let broken = dir.path().join("broken.jsonl");
        fs::write(&broken, "{\"mask0\": 1}\n{oops\n")?;
        let err = load_configurations(&broken).unwrap_err();
        assert!(format!("{err:#}").contains(":2"), "{err:#}");
        Ok(())
    }
}
