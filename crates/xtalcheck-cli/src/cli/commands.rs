use super::CliError;
use super::helpers::{build_sink, load_config, open_store, write_report};
use std::path::PathBuf;
use xtalcheck_core::config::RunMode;
use xtalcheck_core::domain::{GroupId, RecordId};
use xtalcheck_core::engine::{
    CanonicalChecker, CrossCheckOptions, CrossChecker, GroupMemberChecker, SpacegroupAuditor,
};
use xtalcheck_core::matcher::ToleranceMatcher;

#[derive(clap::Args)]
pub(super) struct CommonArgs {
    /// Run configuration path
    #[arg(long, default_value = "xtalcheck.json")]
    config: PathBuf,

    /// Store root override
    #[arg(long)]
    store: Option<PathBuf>,

    /// Disable the streaming sink, log only
    #[arg(long)]
    no_stream: bool,

    /// JSON run report output path
    #[arg(long)]
    report: Option<PathBuf>,
}

#[derive(clap::Args)]
pub(super) struct CrosscheckArgs {
    #[command(flatten)]
    common: CommonArgs,

    /// Bound the grouping query to the first N catalog entries
    #[arg(long)]
    limit: Option<usize>,
}

#[derive(clap::Args)]
pub(super) struct CanonicalsArgs {
    #[command(flatten)]
    common: CommonArgs,

    /// Primary group id
    #[arg(long)]
    primary: u64,

    /// First secondary group id (inclusive)
    #[arg(long)]
    secondary_start: u64,

    /// Last secondary group id (exclusive)
    #[arg(long)]
    secondary_end: u64,
}

#[derive(clap::Args)]
pub(super) struct GroupmembersArgs {
    #[command(flatten)]
    common: CommonArgs,

    /// First group id (inclusive)
    #[arg(long)]
    start: u64,

    /// Last group id (exclusive)
    #[arg(long)]
    end: u64,
}

#[derive(clap::Args)]
pub(super) struct SpacegroupsArgs {
    #[command(flatten)]
    common: CommonArgs,

    /// First record id (inclusive)
    #[arg(long)]
    start: u64,

    /// Last record id (exclusive)
    #[arg(long)]
    end: u64,
}

pub(super) fn run_crosscheck_command(args: CrosscheckArgs) -> Result<i32, CliError> {
    let config = load_config(&args.common.config)?;
    let store = open_store(&config, args.common.store);
    let matcher = ToleranceMatcher::new(config.matcher);
    let mut sink = build_sink(&config, RunMode::Crosscheck, args.common.no_stream)?;

    let options = CrossCheckOptions {
        scan_limit: args.limit.or(config.scan_limit),
        cache_missing: config.cache_missing,
        ..CrossCheckOptions::default()
    };
    let summary = CrossChecker::new(&store, &matcher, sink.as_mut()).run(&options)?;

    println!(
        "Cross-check: {} comparisons across {} batches, {} matches, {} pairs skipped{}",
        summary.comparisons,
        summary.batches,
        summary.matches,
        summary.skipped_pairs,
        if summary.cancelled { " (cancelled)" } else { "" },
    );
    if let Some(report) = &args.common.report {
        write_report(
            report,
            RunMode::Crosscheck,
            serde_json::json!({
                "batches": summary.batches,
                "comparisons": summary.comparisons,
                "matches": summary.matches,
                "skippedPairs": summary.skipped_pairs,
                "cancelled": summary.cancelled,
            }),
        )?;
    }
    Ok(0)
}

pub(super) fn run_canonicals_command(args: CanonicalsArgs) -> Result<i32, CliError> {
    let config = load_config(&args.common.config)?;
    let store = open_store(&config, args.common.store);
    let matcher = ToleranceMatcher::new(config.matcher);
    let mut sink = build_sink(&config, RunMode::Canonicals, args.common.no_stream)?;

    let summary = CanonicalChecker::new(&store, &matcher, sink.as_mut()).run(
        GroupId(args.primary),
        GroupId(args.secondary_start),
        GroupId(args.secondary_end),
    )?;

    println!(
        "Canonicals: {} of {} candidates compared, {} matches, {} fast-path skips, {} missing",
        summary.compared,
        summary.candidates,
        summary.matches,
        summary.fast_path_skips,
        summary.missing_groups,
    );
    if let Some(report) = &args.common.report {
        write_report(
            report,
            RunMode::Canonicals,
            serde_json::json!({
                "candidates": summary.candidates,
                "compared": summary.compared,
                "matches": summary.matches,
                "fastPathSkips": summary.fast_path_skips,
                "missingGroups": summary.missing_groups,
            }),
        )?;
    }
    Ok(0)
}

pub(super) fn run_groupmembers_command(args: GroupmembersArgs) -> Result<i32, CliError> {
    let config = load_config(&args.common.config)?;
    let store = open_store(&config, args.common.store);
    let matcher = ToleranceMatcher::new(config.matcher);
    let mut sink = build_sink(&config, RunMode::Groupmembers, args.common.no_stream)?;

    let summary = GroupMemberChecker::new(&store, &matcher, sink.as_mut())
        .run(GroupId(args.start), GroupId(args.end))?;

    println!(
        "Group members: {} members compared across {} groups, {} matches, {} skipped, {} missing groups",
        summary.members_compared,
        summary.groups_checked,
        summary.matches,
        summary.skipped_members,
        summary.missing_groups,
    );
    if let Some(report) = &args.common.report {
        write_report(
            report,
            RunMode::Groupmembers,
            serde_json::json!({
                "groupsChecked": summary.groups_checked,
                "membersCompared": summary.members_compared,
                "matches": summary.matches,
                "skippedMembers": summary.skipped_members,
                "missingGroups": summary.missing_groups,
            }),
        )?;
    }
    Ok(0)
}

pub(super) fn run_spacegroups_command(args: SpacegroupsArgs) -> Result<i32, CliError> {
    let config = load_config(&args.common.config)?;
    let store = open_store(&config, args.common.store);
    let mut sink = build_sink(&config, RunMode::Spacegroups, args.common.no_stream)?;

    let summary = SpacegroupAuditor::new(&store, sink.as_mut())
        .run(RecordId(args.start), RecordId(args.end))?;

    println!(
        "Spacegroups: {} records audited, {} consistent, {} inconsistent, {} missing",
        summary.records,
        summary.consistent,
        summary.inconsistent,
        summary.missing_records,
    );
    if let Some(report) = &args.common.report {
        write_report(
            report,
            RunMode::Spacegroups,
            serde_json::json!({
                "records": summary.records,
                "consistent": summary.consistent,
                "inconsistent": summary.inconsistent,
                "missingRecords": summary.missing_records,
            }),
        )?;
    }
    Ok(0)
}
