use anyhow::Result;
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use serde::Serialize;

use super::StrictFailure;
use super::command::{Cli, InfoArgs, ReportFormat};
use crate::input::InputReader;
use ac4::process::extract::{Extractor, SyncFrame};
use ac4::process::parse::TocParser;
use ac4::process::rewrite::TocLayout;
use ac4::structs::sink::FilteringSink;
use ac4::structs::substream::{SubstreamCoding, SubstreamSummary};
use ac4::structs::toc_element::{FieldSet, TocElement, TocField};

pub fn cmd_info(args: &InfoArgs, cli: &Cli, multi: Option<&MultiProgress>) -> Result<()> {
    log::info!("Analyzing AC-4 stream: {}", args.input.display());

    let mut input_reader = InputReader::new(&args.input)?;
    let mut extractor = Extractor::default();
    let mut context = AnalysisContext::new(args.format, args.frames);

    if let Some(multi) = multi {
        let pb = multi.add(ProgressBar::new_spinner());
        pb.set_style(ProgressStyle::with_template("{spinner:.green} {msg}")?);
        pb.enable_steady_tick(std::time::Duration::from_millis(100));
        pb.set_message("Analyzing frames...");
        context.pb = Some(pb);
    }

    input_reader.process_chunks(64 * 1024, |chunk| {
        context.total_bytes += chunk.len();
        extractor.push_bytes(chunk);

        for frame_result in extractor.by_ref() {
            let Ok(frame) = frame_result else {
                continue;
            };

            context.process_frame(&frame, cli)?;
            if context.is_done() {
                return Ok(false);
            }
        }

        Ok(true)
    })?;

    context.skipped_bytes = extractor.skipped_bytes();
    context.finish()
}

#[derive(Debug, Serialize)]
struct FrameReport {
    index: usize,
    offset: u64,
    crc: bool,
    frame_size: usize,
    bitstream_version: u64,
    sequence_counter: u64,
    fs_index: u8,
    frame_rate_index: u8,
    frame_len_base: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    short_program_id: Option<u64>,
    presentations: Vec<PresentationReport>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    presentation_configs: Vec<u64>,
    n_substreams: u64,
    substream_sizes: Vec<u64>,
    substreams: Vec<SubstreamReport>,
    toc_end: u64,
}

#[derive(Debug, Serialize)]
struct PresentationReport {
    level: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    id: Option<u64>,
}

#[derive(Debug, Serialize)]
struct SubstreamReport {
    index: u64,
    coding: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    channels: Option<u32>,
    lfe: bool,
}

impl From<&SubstreamSummary> for SubstreamReport {
    fn from(substream: &SubstreamSummary) -> Self {
        let (coding, channels) = match substream.coding {
            SubstreamCoding::Channel(mode) => {
                let channels = mode
                    .num_channels()
                    .inspect_err(|e| log::debug!("Substream {}: {e}", substream.index))
                    .ok();
                (mode.to_string(), channels)
            }
            SubstreamCoding::Object => ("objects".to_string(), None),
            SubstreamCoding::Ajoc => ("A-JOC".to_string(), None),
        };

        Self {
            index: substream.index,
            coding,
            channels,
            lfe: substream.lfe,
        }
    }
}

fn analyze_frame(index: usize, frame: &SyncFrame) -> Result<FrameReport> {
    let mut elements: Vec<TocElement> = Vec::new();
    let mut sink = FilteringSink::new(FieldSet::INFO, |element| elements.push(element));
    let summary = TocParser::new(&mut sink).parse(frame.raw_frame())?;

    let layout = TocLayout::from_elements(&elements)?;
    let presentations = layout
        .slots
        .iter()
        .map(|slot| PresentationReport {
            level: slot.level.value,
            id: slot.id.map(|id| id.value),
        })
        .collect();

    let presentation_configs = elements
        .iter()
        .filter(|element| element.name == TocField::PresentationConfig)
        .filter_map(|element| element.value)
        .collect();

    let substreams = summary.substreams.iter().map(SubstreamReport::from).collect();

    Ok(FrameReport {
        index,
        offset: frame.offset,
        crc: frame.has_crc(),
        frame_size: frame.frame_size,
        bitstream_version: summary.bitstream_version,
        sequence_counter: summary.sequence_counter,
        fs_index: summary.fs_index,
        frame_rate_index: summary.frame_rate_index,
        frame_len_base: summary.frame_len_base,
        short_program_id: summary.short_program_id,
        presentations,
        presentation_configs,
        n_substreams: summary.n_substreams,
        substream_sizes: summary.substream_sizes,
        substreams,
        toc_end: summary.toc_end,
    })
}

struct AnalysisContext {
    format: ReportFormat,
    max_frames: Option<usize>,
    frame_count: usize,
    failed_frames: usize,
    reports: Vec<FrameReport>,
    pb: Option<ProgressBar>,
    total_bytes: usize,
    skipped_bytes: u64,
}

impl AnalysisContext {
    fn new(format: ReportFormat, max_frames: Option<usize>) -> Self {
        Self {
            format,
            max_frames,
            frame_count: 0,
            failed_frames: 0,
            reports: Vec::new(),
            pb: None,
            total_bytes: 0,
            skipped_bytes: 0,
        }
    }

    fn is_done(&self) -> bool {
        self.max_frames
            .is_some_and(|max_frames| self.frame_count >= max_frames)
    }

    fn process_frame(&mut self, frame: &SyncFrame, cli: &Cli) -> Result<()> {
        match analyze_frame(self.frame_count, frame) {
            Ok(report) => match self.format {
                ReportFormat::Plain => {
                    if let Some(ref pb) = self.pb {
                        pb.suspend(|| display_frame(&report));
                    } else {
                        display_frame(&report);
                    }
                }
                ReportFormat::Yaml => self.reports.push(report),
            },
            Err(e) => {
                if cli.strict {
                    return Err(StrictFailure {
                        index: self.frame_count,
                        offset: frame.offset,
                        message: format!("{e:#}"),
                    }
                    .into());
                }
                log::warn!(
                    "Parse error at frame {} (offset {}): {e}",
                    self.frame_count,
                    frame.offset
                );
                self.failed_frames += 1;
            }
        }

        self.frame_count += 1;

        if self.frame_count.is_multiple_of(100)
            && let Some(ref pb) = self.pb
        {
            pb.set_message(format!("Analyzing frames...       {}", self.frame_count));
            pb.tick();
        }

        Ok(())
    }

    fn finish(self) -> Result<()> {
        if let Some(ref pb) = self.pb {
            pb.finish_and_clear();
        }

        if self.frame_count == 0 {
            println!("No AC-4 sync frame found in the input.");
            return Ok(());
        }

        match self.format {
            ReportFormat::Plain => {
                println!("Analysis Summary");
                println!("  Frames processed          {}", self.frame_count);
                println!("  TOC parse failures        {}", self.failed_frames);
                println!("  Bytes skipped             {}", self.skipped_bytes);
                println!("  Bytes read                {}", self.total_bytes);
                println!();
            }
            ReportFormat::Yaml => {
                print!("{}", serde_yaml_ng::to_string(&self.reports)?);
                log::info!(
                    "{} frame(s), {} TOC parse failure(s), {} byte(s) skipped",
                    self.frame_count,
                    self.failed_frames,
                    self.skipped_bytes
                );
            }
        }

        Ok(())
    }
}

fn display_frame(report: &FrameReport) {
    println!("Frame {} at offset {}", report.index, report.offset);
    println!("  Frame size                {} bytes", report.frame_size);
    println!("  CRC word                  {}", report.crc);
    println!("  Bitstream version         {}", report.bitstream_version);
    println!("  Sequence counter          {}", report.sequence_counter);
    println!(
        "  Sampling rate             {}",
        if report.fs_index == 0 { "44.1 kHz" } else { "48 kHz" }
    );
    println!(
        "  Frame rate index          {} ({} samples)",
        report.frame_rate_index, report.frame_len_base
    );
    if let Some(id) = report.short_program_id {
        println!("  Short program ID          {id:#06X}");
    }

    for (index, presentation) in report.presentations.iter().enumerate() {
        let id = presentation
            .id
            .map_or_else(|| "none".to_string(), |id| id.to_string());
        println!(
            "  Presentation {index:<3}         level {}, id {id}",
            presentation.level
        );
    }

    println!("  Substreams                {}", report.n_substreams);
    for substream in &report.substreams {
        let channels = substream
            .channels
            .map_or_else(String::new, |channels| format!(", {channels} ch"));
        let lfe = if substream.lfe { ", LFE" } else { "" };
        println!(
            "    Substream {:<3}           {}{channels}{lfe}",
            substream.index, substream.coding
        );
    }
    println!("  TOC end                   bit {}", report.toc_end);
    println!();
}
