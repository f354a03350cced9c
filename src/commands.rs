use std::collections::HashMap;
use std::io::{self, Write};
use std::sync::Arc;

use chrono::Local;
use comfy_table::presets::UTF8_FULL;
use comfy_table::{Attribute, Cell, Color, ContentArrangement, Table};

use crate::config::Config;
use crate::error::{ChoreError, Result};
use crate::household::Household;
use crate::models::{
    parse_day, weekday_label, Chore, ChoreDraft, GroupKey, Member, MemberColor, PriorityLevel,
    RepetitionTime, DAY_FORMAT,
};
use crate::ordering;
use crate::proposals::{ProposalOutcome, VoteOutcome};
use crate::completion::CompletionOutcome;
use crate::storage::JsonFileStore;

/// Household opened on the configured data directory, acting as one user.
struct Session {
    household: Household,
    user: String,
}

impl Session {
    fn open(user: Option<&str>) -> Result<Session> {
        let config = Config::from_env().with_user(user.map(str::to_string));
        let user = config.require_user()?.to_string();
        let store = JsonFileStore::open(&config.data_dir)?;
        Ok(Session {
            household: Household::new(Arc::new(store)),
            user,
        })
    }

    fn group(&self) -> Result<GroupKey> {
        self.household.directory.group_of(&self.user)
    }

    /// Resolves a full id or a unique id prefix as shown by `list`.
    fn resolve(&self, group: GroupKey, id: &str) -> Result<Chore> {
        if let Some(chore) = self.household.chores.get(group, id)? {
            return Ok(chore);
        }
        let mut matches: Vec<Chore> = self
            .household
            .chores
            .list(group)?
            .into_iter()
            .filter(|c| c.id.starts_with(id))
            .collect();
        if matches.len() == 1 {
            Ok(matches.remove(0))
        } else {
            Err(ChoreError::not_found("chores", id))
        }
    }
}

fn report(silent: bool, err: &ChoreError) {
    if !silent {
        eprintln!("Error: {}", err);
    }
}

fn short_id(id: &str) -> &str {
    id.get(..8).unwrap_or(id)
}

fn member_color(color: MemberColor) -> Color {
    match color {
        MemberColor::Red => Color::Red,
        MemberColor::Orange => Color::Rgb { r: 255, g: 165, b: 0 },
        MemberColor::Yellow => Color::Yellow,
        MemberColor::Green => Color::Green,
        MemberColor::Blue => Color::Blue,
        MemberColor::Purple => Color::Magenta,
        MemberColor::Pink => Color::Rgb { r: 255, g: 105, b: 180 },
        MemberColor::Teal => Color::Cyan,
        MemberColor::Brown => Color::Rgb { r: 139, g: 69, b: 19 },
        MemberColor::Gray => Color::Grey,
    }
}

fn priority_color(priority: PriorityLevel) -> Color {
    match priority {
        PriorityLevel::High => Color::Red,
        PriorityLevel::Medium => Color::Yellow,
        PriorityLevel::Low => Color::Green,
    }
}

fn parse_priority(priority: Option<String>) -> Result<Option<PriorityLevel>> {
    match priority {
        None => Ok(None),
        Some(p) => PriorityLevel::parse(&p)
            .map(Some)
            .ok_or_else(|| ChoreError::Serialization(format!("unknown priority '{}', use low, medium or high", p))),
    }
}

/// Registers or updates the profile of `user_id`.
pub fn cmd_register(user_id: String, name: String, color: Option<String>, silent: bool) {
    let result = (|| -> Result<Member> {
        let color = match color {
            Some(c) => MemberColor::parse(&c)
                .ok_or_else(|| ChoreError::Serialization(format!("unknown color '{}'", c)))?,
            None => MemberColor::default(),
        };
        let session = Session::open(Some(user_id.as_str()))?;
        session.household.directory.register(&user_id, &name, color)
    })();
    match result {
        Ok(m) => { if !silent { println!("Registered {} ({}) in {}.", m.name, m.id, m.color); } }
        Err(e) => report(silent, &e),
    }
}

/// Starts a new household with the acting user as its first member.
pub fn cmd_group_create(user: Option<&str>, silent: bool) {
    let result = Session::open(user).and_then(|s| s.household.directory.create_group(&s.user));
    match result {
        Ok(key) => { if !silent { println!("Created group {}. Share this key to invite others.", key); } }
        Err(e) => report(silent, &e),
    }
}

pub fn cmd_group_join(user: Option<&str>, key: String, silent: bool) {
    let result = (|| -> Result<GroupKey> {
        let key: GroupKey = key
            .parse()
            .map_err(|_| ChoreError::Serialization(format!("invalid group key '{}'", key)))?;
        let session = Session::open(user)?;
        session.household.directory.join_group(&session.user, key)?;
        Ok(key)
    })();
    match result {
        Ok(key) => { if !silent { println!("Joined group {}.", key); } }
        Err(e) => report(silent, &e),
    }
}

pub fn cmd_group_leave(user: Option<&str>, silent: bool) {
    match Session::open(user).and_then(|s| s.household.directory.leave_group(&s.user)) {
        Ok(()) => { if !silent { println!("Left group."); } }
        Err(e) => report(silent, &e),
    }
}

/// Lists the members of the acting user's household.
pub fn cmd_members(user: Option<&str>) {
    let result = Session::open(user).and_then(|s| {
        let group = s.group()?;
        Ok((group, s.household.directory.members(group)?))
    });
    let (group, members) = match result {
        Ok(r) => r,
        Err(e) => return report(false, &e),
    };
    let mut table = Table::new();
    table.load_preset(UTF8_FULL).set_header(vec![
        Cell::new("ID").add_attribute(Attribute::Bold),
        Cell::new("Name").add_attribute(Attribute::Bold),
        Cell::new("Color").add_attribute(Attribute::Bold),
    ]);
    for m in members {
        table.add_row(vec![
            Cell::new(&m.id),
            Cell::new(&m.name).fg(member_color(m.color)),
            Cell::new(m.color),
        ]);
    }
    println!("Group {}", group);
    println!("{table}");
}

/// Adds a new chore through the New-Chore flow: a proposal when the
/// household has other members, active immediately otherwise.
#[allow(clippy::too_many_arguments)]
pub fn cmd_add(
    user: Option<&str>,
    name: String,
    date: Option<String>,
    description: Option<String>,
    priority: Option<String>,
    minutes: Option<u32>,
    repeat: Option<String>,
    assign: Vec<String>,
    checklist: bool,
    silent: bool,
) {
    let result = (|| -> Result<Chore> {
        let repetition = repeat.as_deref().map(RepetitionTime::parse).unwrap_or_default();
        if let RepetitionTime::Unrecognized(r) = &repetition {
            return Err(ChoreError::Serialization(format!(
                "unknown repetition '{}', use none, daily, weekly, monthly or yearly",
                r
            )));
        }
        let draft = ChoreDraft {
            name,
            date: date.unwrap_or_else(|| Local::now().date_naive().format(DAY_FORMAT).to_string()),
            description: description.unwrap_or_default(),
            priority: parse_priority(priority)?.unwrap_or_default(),
            duration_minutes: minutes.unwrap_or(0),
            repetition,
            assigned_users: assign,
            checklist,
            ..ChoreDraft::default()
        };
        let session = Session::open(user)?;
        session.household.proposals.submit(draft, &session.user)
    })();
    match result {
        Ok(c) => {
            if !silent {
                let state = if c.proposal { "proposed, awaiting approval" } else { "added" };
                println!("Chore {} (id = {}).", state, short_id(&c.id));
            }
        }
        Err(e) => report(silent, &e),
    }
}

/// Lists chores in house order.
///
/// By default shows active chores that are not yet done.
pub fn cmd_list(user: Option<&str>, all: bool, proposals: bool) {
    let result = Session::open(user).and_then(|s| {
        let group = s.group()?;
        Ok((s.household.chores.list(group)?, s.household.directory.members(group)?))
    });
    let (snapshot, members) = match result {
        Ok(r) => r,
        Err(e) => return report(false, &e),
    };

    let mut chores = if proposals { ordering::proposals(&snapshot) } else { ordering::active(&snapshot) };
    if !all && !proposals {
        chores.retain(|c| !c.completed);
    }
    if chores.is_empty() {
        println!("No chores found.");
        return;
    }

    let names: HashMap<&str, &Member> = members.iter().map(|m| (m.id.as_str(), m)).collect();

    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec![
            Cell::new("ID").add_attribute(Attribute::Bold),
            Cell::new("Name").add_attribute(Attribute::Bold),
            Cell::new("Date").add_attribute(Attribute::Bold),
            Cell::new("Day").add_attribute(Attribute::Bold),
            Cell::new("Priority").add_attribute(Attribute::Bold),
            Cell::new("Min").add_attribute(Attribute::Bold),
            Cell::new("Repeat").add_attribute(Attribute::Bold),
            Cell::new("Assigned").add_attribute(Attribute::Bold),
            Cell::new("Votes").add_attribute(Attribute::Bold),
            Cell::new("Status").add_attribute(Attribute::Bold),
        ]);

    for c in chores {
        let assignee = c.assigned_users.first().map(|id| {
            match names.get(id.as_str()) {
                Some(m) => Cell::new(&m.name).fg(member_color(m.color)),
                None => Cell::new(id),
            }
        }).unwrap_or_else(|| Cell::new("-"));

        let (status, status_color) = if c.proposal {
            ("Proposed", Color::Magenta)
        } else if c.completed {
            ("Done", Color::Green)
        } else {
            ("Pending", Color::Yellow)
        };

        table.add_row(vec![
            Cell::new(short_id(&c.id)),
            Cell::new(&c.name),
            Cell::new(&c.date),
            Cell::new(&c.day),
            Cell::new(c.priority).fg(priority_color(c.priority)),
            Cell::new(c.duration_minutes),
            Cell::new(&c.repetition),
            assignee,
            Cell::new(c.votes),
            Cell::new(status).fg(status_color),
        ]);
    }

    println!("{table}");
}

/// Prints every field of one chore.
pub fn cmd_show(user: Option<&str>, id: String) {
    let result = Session::open(user).and_then(|s| {
        let group = s.group()?;
        s.resolve(group, &id)
    });
    let c = match result {
        Ok(c) => c,
        Err(e) => return report(false, &e),
    };
    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    let rows: Vec<(&str, String)> = vec![
        ("ID", c.id.clone()),
        ("Name", c.name.clone()),
        ("Date", format!("{} ({})", c.date, c.day)),
        ("Description", c.description.clone()),
        ("Priority", c.priority.to_string()),
        ("Minutes", c.duration_minutes.to_string()),
        ("Repeat", c.repetition.to_string()),
        ("Series", c.series_id.clone()),
        ("Assigned", c.assigned_users.join(", ")),
        ("Created by", c.created_by.clone()),
        ("Proposal", c.proposal.to_string()),
        ("Votes", format!("{} ({} voters)", c.votes, c.voters.len())),
        ("Completed", match (&c.completed_by, &c.completed_at) {
            (Some(by), Some(at)) if c.completed => format!("by {} at {}", by, at),
            _ => c.completed.to_string(),
        }),
        ("Checklist", c.checklist.to_string()),
    ];
    for (k, v) in rows {
        table.add_row(vec![Cell::new(k).add_attribute(Attribute::Bold), Cell::new(v)]);
    }
    println!("{table}");
}

/// Edits an existing chore's details and writes the whole chore back.
#[allow(clippy::too_many_arguments)]
pub fn cmd_edit(
    user: Option<&str>,
    id: String,
    name: Option<String>,
    date: Option<String>,
    description: Option<String>,
    priority: Option<String>,
    minutes: Option<u32>,
    assign: Option<Vec<String>>,
    silent: bool,
) {
    let result = (|| -> Result<Chore> {
        let priority = parse_priority(priority)?;
        let session = Session::open(user)?;
        let group = session.group()?;
        let mut c = session.resolve(group, &id)?;
        if let Some(n) = name { c.name = n; }
        if let Some(d) = date {
            let day = parse_day(&d)?;
            c.date = d;
            c.day = weekday_label(day);
        }
        if let Some(d) = description { c.description = d; }
        if let Some(p) = priority { c.priority = p; }
        if let Some(m) = minutes { c.duration_minutes = m; }
        if let Some(a) = assign { c.assigned_users = a; }
        if c.name.trim().is_empty() {
            return Err(ChoreError::EmptyName);
        }
        session.household.chores.edit(&c.id, &c, group)?;
        Ok(c)
    })();
    match result {
        Ok(c) => { if !silent { println!("Chore {} updated.", short_id(&c.id)); } }
        Err(e) => report(silent, &e),
    }
}

/// Removes a single chore; other occurrences of its series stay.
pub fn cmd_remove(user: Option<&str>, id: String, silent: bool) {
    let result = Session::open(user).and_then(|s| {
        let group = s.group()?;
        let c = s.resolve(group, &id)?;
        s.household.chores.delete(&c.id, group)?;
        Ok(c)
    });
    match result {
        Ok(c) => { if !silent { println!("Chore {} removed.", short_id(&c.id)); } }
        Err(e) => report(silent, &e),
    }
}

pub fn cmd_vote(user: Option<&str>, id: String, reject: bool, silent: bool) {
    let result = Session::open(user).and_then(|s| {
        let group = s.group()?;
        let c = s.resolve(group, &id)?;
        s.household.proposals.vote(group, &c.id, &s.user, !reject)
    });
    match result {
        Ok(outcome) => {
            if silent { return; }
            match outcome {
                VoteOutcome::Recorded { votes, closed: true } => println!("Vote recorded ({} votes). Proposal approved.", votes),
                VoteOutcome::Recorded { votes, .. } => println!("Vote recorded ({} votes).", votes),
                VoteOutcome::AlreadyVoted => println!("You already voted on this chore."),
                VoteOutcome::NotProposed => println!("This chore is not awaiting approval."),
            }
        }
        Err(e) => report(silent, &e),
    }
}

pub fn cmd_approve(user: Option<&str>, id: String, silent: bool) {
    let result = Session::open(user).and_then(|s| {
        let group = s.group()?;
        let c = s.resolve(group, &id)?;
        s.household.proposals.approve(group, &c.id)
    });
    match result {
        Ok(ProposalOutcome::Approved { generated, .. }) => {
            if !silent {
                println!("Chore approved.");
                if generated > 0 { println!("{} repeat occurrences created.", generated); }
            }
        }
        Ok(_) => { if !silent { println!("This chore is not awaiting approval."); } }
        Err(e) => report(silent, &e),
    }
}

pub fn cmd_reject(user: Option<&str>, id: String, silent: bool) {
    let result = Session::open(user).and_then(|s| {
        let group = s.group()?;
        let c = s.resolve(group, &id)?;
        s.household.proposals.reject(group, &c.id)
    });
    match result {
        Ok(ProposalOutcome::Rejected) => { if !silent { println!("Proposal rejected."); } }
        Ok(_) => { if !silent { println!("This chore is not awaiting approval."); } }
        Err(e) => report(silent, &e),
    }
}

/// Toggles completion of a chore.
pub fn cmd_complete(user: Option<&str>, id: String, silent: bool) {
    let result = Session::open(user).and_then(|s| {
        let group = s.group()?;
        let c = s.resolve(group, &id)?;
        s.household.completion.toggle(group, &c.id, &s.user)
    });
    match result {
        Ok(CompletionOutcome::Completed { .. }) => { if !silent { println!("Chore marked as complete."); } }
        Ok(CompletionOutcome::Reopened) => { if !silent { println!("Chore marked as not complete."); } }
        Err(e) => report(silent, &e),
    }
}

/// Deletes the chore's series from `from` (default: the chore's own date)
/// onwards.
pub fn cmd_delete_series(user: Option<&str>, id: String, from: Option<String>, silent: bool) {
    let result = Session::open(user).and_then(|s| {
        let group = s.group()?;
        let c = s.resolve(group, &id)?;
        let from = from.unwrap_or_else(|| c.date.clone());
        s.household.recurrence.delete_future_occurrences(&c.series_id, &from, group)
    });
    match result {
        Ok(0) => { if !silent { println!("Nothing to delete."); } }
        Ok(n) => { if !silent { println!("{} occurrences deleted.", n); } }
        Err(e) => report(silent, &e),
    }
}

/// Prints completion rates for the household and each member.
pub fn cmd_stats(user: Option<&str>) {
    let result = Session::open(user).and_then(|s| s.household.completion.equity(s.group()?));
    let r = match result {
        Ok(r) => r,
        Err(e) => return report(false, &e),
    };
    let mut table = Table::new();
    table.load_preset(UTF8_FULL).set_header(vec![
        Cell::new("Member").add_attribute(Attribute::Bold),
        Cell::new("Assigned").add_attribute(Attribute::Bold),
        Cell::new("Done").add_attribute(Attribute::Bold),
        Cell::new("Rate").add_attribute(Attribute::Bold),
        Cell::new("Logged").add_attribute(Attribute::Bold),
    ]);
    for m in &r.members {
        table.add_row(vec![
            Cell::new(&m.name).fg(member_color(m.color)),
            Cell::new(m.assigned),
            Cell::new(m.completed),
            Cell::new(format!("{:.0}%", m.completion_rate * 100.0)),
            Cell::new(m.logged_completions),
        ]);
    }
    println!("{table}");
    println!(
        "House: {}/{} done ({:.0}%)",
        r.total_completed,
        r.total_chores,
        r.house_completion_rate * 100.0
    );
}

/// Prints the completion log, newest first.
pub fn cmd_history(user: Option<&str>) {
    let result = Session::open(user).and_then(|s| {
        let group = s.group()?;
        let logs = s.household.completion.history(group)?;
        let chores: HashMap<String, String> = s
            .household
            .chores
            .list(group)?
            .into_iter()
            .map(|c| (c.id, c.name))
            .collect();
        let names: HashMap<String, String> = s
            .household
            .directory
            .members(group)?
            .into_iter()
            .map(|m| (m.id, m.name))
            .collect();
        Ok((logs, chores, names))
    });
    let (logs, chores, names) = match result {
        Ok(r) => r,
        Err(e) => return report(false, &e),
    };
    if logs.is_empty() {
        println!("No completions logged.");
        return;
    }
    let mut table = Table::new();
    table.load_preset(UTF8_FULL).set_header(vec!["When", "Chore", "By"]);
    for entry in logs {
        let chore = chores.get(&entry.chore_id).cloned().unwrap_or_else(|| "(deleted)".into());
        let by: Vec<String> = entry
            .completed_by
            .iter()
            .map(|u| names.get(u).cloned().unwrap_or_else(|| u.clone()))
            .collect();
        table.add_row(vec![entry.timestamp, chore, by.join(", ")]);
    }
    println!("{table}");
}

/// Resets the local database by deleting every collection file.
pub fn cmd_reset(force: bool) {
    if !force {
        print!("Are you sure you want to delete all local chores, members and logs? This cannot be undone. [y/N] ");
        let _ = io::stdout().flush();
        let mut input = String::new();
        if io::stdin().read_line(&mut input).is_err() || input.trim().to_lowercase() != "y" {
            println!("Aborted.");
            return;
        }
    }

    let config = Config::from_env();
    match JsonFileStore::open(&config.data_dir).and_then(|s| s.destroy()) {
        Ok(()) => println!("Database reset successfully."),
        Err(e) => eprintln!("Failed to reset database: {}", e),
    }
}
