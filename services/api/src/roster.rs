use crate::infra::parse_date;
use chrono::{Local, NaiveDate};
use clap::Args;
use headstart::error::AppError;
use headstart::matching::{
    determine_role, DashboardParams, DashboardQuery, EmptySelection, RosterImporter,
};
use headstart::profiles::{ProfileId, UserProfile};
use std::path::PathBuf;

#[derive(Args, Debug)]
pub(crate) struct RosterArgs {
    /// Roster snapshot: dashboard JSON (`{"users": [...]}` or a bare array) or CSV export
    pub(crate) file: PathBuf,
    /// Case-insensitive match on name, intro, or skills
    #[arg(long)]
    pub(crate) search: Option<String>,
    /// Comma-separated need filters (needsPM, needsDev, needsDesigner, needsMarketing, anyNeeds, noNeeds)
    #[arg(long)]
    pub(crate) needs: Option<String>,
    /// Comma-separated hour buckets (20-30, 31-40, 41-50, 50+)
    #[arg(long)]
    pub(crate) hours: Option<String>,
    /// Comma-separated idea statuses (one, few, none)
    #[arg(long)]
    pub(crate) idea: Option<String>,
    /// Sort key: match, name, hours, or recent
    #[arg(long)]
    pub(crate) sort: Option<String>,
    /// Sort direction: asc or desc
    #[arg(long)]
    pub(crate) direction: Option<String>,
    /// Profile id to leave out, as the dashboard hides the viewer
    #[arg(long)]
    pub(crate) viewer: Option<String>,
    /// Meaning of an empty --needs list
    #[arg(long, value_parser = parse_empty_selection, default_value = "match_none")]
    pub(crate) empty_needs: EmptySelection,
    /// Reference date for "last seen" (defaults to today)
    #[arg(long, value_parser = parse_date)]
    pub(crate) today: Option<NaiveDate>,
}

#[derive(Args, Debug)]
pub(crate) struct SuggestRoleArgs {
    /// Skill label; repeat for each skill
    #[arg(long = "skill")]
    pub(crate) skills: Vec<String>,
}

pub(crate) fn run_roster(args: RosterArgs) -> Result<(), AppError> {
    let today = args.today.unwrap_or_else(|| Local::now().date_naive());
    let roster = RosterImporter::from_path(&args.file)?;
    let lines = visible_roster(&args, &roster, today)?;

    println!(
        "Roster {} ({} of {} members shown)",
        args.file.display(),
        lines.len(),
        roster.len()
    );
    for line in lines {
        println!("- {line}");
    }
    Ok(())
}

pub(crate) fn run_suggest_role(args: SuggestRoleArgs) {
    println!("{}", determine_role(&args.skills));
}

pub(crate) fn visible_roster(
    args: &RosterArgs,
    roster: &[UserProfile],
    today: NaiveDate,
) -> Result<Vec<String>, AppError> {
    let params = DashboardParams {
        search: args.search.clone(),
        needs: args.needs.clone(),
        hours: args.hours.clone(),
        idea: args.idea.clone(),
        sort: args.sort.clone(),
        direction: args.direction.clone(),
    };
    let query = DashboardQuery::from_params(&params, args.empty_needs)?;
    let viewer = args.viewer.clone().map(ProfileId);

    Ok(query
        .select(roster, viewer.as_ref())
        .into_iter()
        .map(|user| describe(user, today))
        .collect())
}

fn describe(user: &UserProfile, today: NaiveDate) -> String {
    let hours = user
        .hours_per_week
        .map(|hours| format!("{hours}h/wk"))
        .unwrap_or_else(|| "hours n/a".to_string());
    let score = user
        .match_percentage
        .map(|score| format!("{score:.0}%"))
        .unwrap_or_else(|| "--".to_string());
    let idea = user
        .idea_status
        .map(|status| status.token())
        .unwrap_or("unknown");
    let needs: Vec<&str> = user
        .team_needs
        .flags()
        .filter(|(_, wanted)| *wanted)
        .map(|(flag, _)| flag.key())
        .collect();
    let needs = if needs.is_empty() {
        "team complete".to_string()
    } else {
        needs.join(",")
    };
    let seen = match user.last_login {
        Some(at) => {
            let days = (today - at.date_naive()).num_days().max(0);
            format!("seen {days}d ago")
        }
        None => "never seen".to_string(),
    };

    format!(
        "{} | {} (suggested {}) | {} | match {} | idea {} | {} | {}",
        user.name,
        user.role,
        determine_role(&user.skills),
        hours,
        score,
        idea,
        needs,
        seen
    )
}

fn parse_empty_selection(value: &str) -> Result<EmptySelection, String> {
    EmptySelection::parse(value)
        .ok_or_else(|| format!("expected match_none or match_all, got '{value}'"))
}
