use std::io::Write;

use anyhow::{Context, Result};
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};

use super::StrictFailure;
use super::command::{Cli, SelectArgs};
use crate::input::{InputReader, create_output};
use ac4::process::extract::Extractor;
use ac4::process::rewrite::{Outcome, SampleDescriptor, select_presentation_in_samples};
use ac4::utils::errors::ExtractError;

const SAMPLES_PER_BATCH: usize = 256;

#[derive(Debug, Default)]
struct SelectStats {
    rewritten: usize,
    unmodified: usize,
    failed: usize,
    crc_frames: usize,
}

pub fn cmd_select(args: &SelectArgs, cli: &Cli, multi: Option<&MultiProgress>) -> Result<()> {
    let mut input_reader = InputReader::new(&args.input)?;
    if input_reader.is_pipe() {
        log::info!("Reading AC-4 stream from stdin");
    } else {
        log::info!("Reading AC-4 stream: {}", args.input.display());
    }
    let mut data = input_reader.read_all()?;

    let mut stats = SelectStats::default();
    let samples = locate_samples(&data, &mut stats);
    log::info!(
        "Found {} sync frame(s), {} with CRC word",
        samples.len() + stats.crc_frames,
        stats.crc_frames
    );
    if stats.crc_frames > 0 {
        log::warn!(
            "Leaving {} frame(s) with CRC word unmodified",
            stats.crc_frames
        );
    }

    let pb = match multi {
        Some(multi) => {
            let pb = multi.add(ProgressBar::new(samples.len() as u64));
            pb.set_style(ProgressStyle::with_template(
                "{bar:40.cyan/blue} {pos}/{len} frames ({percent}%)\n{msg} | elapsed: {elapsed_precise}",
            )?);
            pb.set_message(format!("selecting presentation {}", args.presentation_id));
            Some(pb)
        }
        None => None,
    };

    for (batch_index, batch) in samples.chunks(SAMPLES_PER_BATCH).enumerate() {
        let batch_start = batch_index * SAMPLES_PER_BATCH;
        let results = select_presentation_in_samples(&mut data, batch, Some(args.presentation_id));

        for ((index, sample), result) in batch.iter().enumerate().zip(results) {
            match result {
                Ok(Outcome::Rewritten { .. }) => stats.rewritten += 1,
                Ok(Outcome::Unmodified(skip)) => {
                    log::debug!("Frame at offset {} unmodified: {skip}", sample.byte_offset);
                    stats.unmodified += 1;
                }
                Err(e) => {
                    if cli.strict {
                        return Err(StrictFailure {
                            index: batch_start + index,
                            offset: sample.byte_offset as u64,
                            message: e.to_string(),
                        }
                        .into());
                    }
                    log::warn!("Frame at offset {} left as is: {e}", sample.byte_offset);
                    stats.failed += 1;
                }
            }
        }

        if let Some(ref pb) = pb {
            pb.inc(batch.len() as u64);
        }
    }

    if let Some(ref pb) = pb {
        pb.finish_and_clear();
    }

    let mut writer = create_output(&args.output)?;
    writer
        .write_all(&data)
        .and_then(|()| writer.flush())
        .with_context(|| format!("Failed to write {}", args.output.display()))?;

    log::info!(
        "Presentation {}: {} frame(s) rewritten, {} unmodified, {} failed, {} with CRC word",
        args.presentation_id,
        stats.rewritten,
        stats.unmodified,
        stats.failed,
        stats.crc_frames
    );

    if stats.rewritten == 0 {
        log::warn!(
            "No frame was rewritten for presentation {}",
            args.presentation_id
        );
    }

    Ok(())
}

/// Raw frames of the non-CRC sync frames in `data`.
fn locate_samples(data: &[u8], stats: &mut SelectStats) -> Vec<SampleDescriptor> {
    let mut extractor = Extractor::default();
    extractor.push_bytes(data);

    let mut samples = Vec::new();
    for result in extractor.by_ref() {
        match result {
            Ok(frame) if frame.has_crc() => stats.crc_frames += 1,
            Ok(frame) => samples.push(SampleDescriptor {
                byte_offset: frame.offset as usize + frame.header_len,
                byte_size: frame.frame_size,
            }),
            Err(ExtractError::InsufficientData) => {}
            Err(e) => log::debug!("{e}"),
        }
    }

    if extractor.skipped_bytes() > 0 {
        log::warn!(
            "Skipped {} byte(s) outside sync frames",
            extractor.skipped_bytes()
        );
    }

    samples
}
