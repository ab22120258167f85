//! The task forest, its dependency links and timeline markers.
//!
//! Every mutating operation either succeeds with all structural invariants
//! intact (forest-shaped parents, links between distinct existing tasks, an
//! acyclic dependency graph) or fails without touching the model.

use std::collections::{HashMap, HashSet};

use chrono::{Days, NaiveDate};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use super::calendar::WorkCalendar;
use super::ids::ItemId;
use super::link::Link;
use super::snapshot::ProjectSnapshot;
use super::task::{Task, TaskKind, TaskPaint, TaskPatch};
use super::view::Marker;
use crate::error::AppError;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "ProjectRepr", into = "ProjectRepr")]
pub struct Project {
    name: Option<String>,
    tasks: IndexMap<ItemId, Task>,
    links: IndexMap<ItemId, Link>,
    markers: IndexMap<ItemId, Marker>,
    next_uid: u64,
}

/// Everything removed by a cascading task delete.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Removal {
    pub tasks: Vec<ItemId>,
    pub links: Vec<ItemId>,
}

/// Chart-compatible wire form: `{ name, data, links, markers }`.
#[derive(Serialize, Deserialize)]
struct ProjectRepr {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    name: Option<String>,
    #[serde(default)]
    data: Vec<Task>,
    #[serde(default)]
    links: Vec<Link>,
    #[serde(default)]
    markers: Vec<Marker>,
}

impl TryFrom<ProjectRepr> for Project {
    type Error = AppError;

    fn try_from(repr: ProjectRepr) -> Result<Self, AppError> {
        let mut project = Project::from_parts(repr.data, repr.links)?;
        project.name = repr.name;
        for marker in repr.markers {
            project.upsert_marker(marker);
        }
        Ok(project)
    }
}

impl From<Project> for ProjectRepr {
    fn from(p: Project) -> Self {
        Self {
            name: p.name,
            data: p.tasks.into_values().collect(),
            links: p.links.into_values().collect(),
            markers: p.markers.into_values().collect(),
        }
    }
}

impl Project {
    pub fn new() -> Self {
        Self {
            next_uid: 1,
            ..Self::default()
        }
    }

    /// Build a project from a complete batch of tasks and links. Parents may
    /// be referenced before they are declared. The batch is validated as a
    /// whole; on error nothing is returned.
    pub fn from_parts(tasks: Vec<Task>, links: Vec<Link>) -> Result<Self, AppError> {
        let mut project = Project::new();
        for mut task in tasks {
            check_task_fields(&mut task)?;
            if project.tasks.contains_key(&task.id) {
                return Err(AppError::invalid(format!("Duplicate task id {}", task.id)));
            }
            project.bump_uid(&task.id);
            project.tasks.insert(task.id.clone(), task);
        }

        for task in project.tasks.values() {
            if task.parent == task.id {
                return Err(AppError::invariant(format!("Task {} cannot be its own parent", task.id)));
            }
            if !task.parent.is_root() && !project.tasks.contains_key(&task.parent) {
                return Err(AppError::invalid(format!(
                    "Task {} references missing parent {}",
                    task.id, task.parent
                )));
            }
        }
        for id in project.tasks.keys() {
            if project.parent_chain_loops(id) {
                return Err(AppError::invariant(format!("Parent cycle through task {id}")));
            }
        }

        for link in links {
            project.add_link(link)?;
        }
        Ok(project)
    }

    // ── Queries ─────────────────────────────────────────────────

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn set_name(&mut self, name: Option<String>) {
        self.name = name.map(|n| n.trim().to_string()).filter(|n| !n.is_empty());
    }

    pub fn get_task(&self, id: &ItemId) -> Option<&Task> {
        self.tasks.get(id)
    }

    pub fn get_link(&self, id: &ItemId) -> Option<&Link> {
        self.links.get(id)
    }

    pub fn has_task(&self, id: &ItemId) -> bool {
        self.tasks.contains_key(id)
    }

    /// Tasks in insertion order.
    pub fn tasks(&self) -> impl Iterator<Item = &Task> {
        self.tasks.values()
    }

    pub fn links(&self) -> impl Iterator<Item = &Link> {
        self.links.values()
    }

    pub fn markers(&self) -> impl Iterator<Item = &Marker> {
        self.markers.values()
    }

    pub fn task_count(&self) -> usize {
        self.tasks.len()
    }

    pub fn link_count(&self) -> usize {
        self.links.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty() && self.links.is_empty() && self.markers.is_empty()
    }

    /// Visit every task in insertion order.
    pub fn each_task(&self, mut visit: impl FnMut(&Task)) {
        for task in self.tasks.values() {
            visit(task);
        }
    }

    /// Direct children in insertion order. `ItemId::root()` yields top-level tasks.
    pub fn children_of(&self, id: &ItemId) -> Vec<ItemId> {
        self.tasks
            .values()
            .filter(|t| &t.parent == id)
            .map(|t| t.id.clone())
            .collect()
    }

    pub fn has_children(&self, id: &ItemId) -> bool {
        self.tasks.values().any(|t| &t.parent == id)
    }

    /// All descendants, depth-first pre-order.
    pub fn descendants_of(&self, id: &ItemId) -> Vec<ItemId> {
        let index = self.child_index();
        let mut out = Vec::new();
        let mut stack: Vec<&ItemId> = index.get(id).map(|c| c.iter().rev().collect()).unwrap_or_default();
        while let Some(next) = stack.pop() {
            out.push(next.clone());
            if let Some(children) = index.get(next) {
                stack.extend(children.iter().rev());
            }
        }
        out
    }

    /// True when `ancestor` appears on `id`'s parent chain.
    pub fn is_ancestor(&self, ancestor: &ItemId, id: &ItemId) -> bool {
        let mut current = self.tasks.get(id).map(|t| &t.parent);
        let mut steps = 0;
        while let Some(parent) = current {
            if parent.is_root() || steps > self.tasks.len() {
                return false;
            }
            if parent == ancestor {
                return true;
            }
            current = self.tasks.get(parent).map(|t| &t.parent);
            steps += 1;
        }
        false
    }

    pub fn depth_of(&self, id: &ItemId) -> usize {
        let mut depth = 0;
        let mut current = self.tasks.get(id).map(|t| &t.parent);
        while let Some(parent) = current {
            if parent.is_root() || depth > self.tasks.len() {
                break;
            }
            depth += 1;
            current = self.tasks.get(parent).map(|t| &t.parent);
        }
        depth
    }

    pub fn snapshot(&self, limit: usize) -> ProjectSnapshot {
        ProjectSnapshot::from_project(self, limit)
    }

    /// Earliest start and latest (exclusive) end over all tasks.
    pub fn span(&self, calendar: &WorkCalendar) -> Option<(NaiveDate, NaiveDate)> {
        let start = self.tasks.values().map(|t| t.start_date).min()?;
        let end = self.tasks.values().map(|t| t.end_date(calendar)).max()?;
        Some((start, end))
    }

    // ── Ids ─────────────────────────────────────────────────────

    /// Next unused numeric id across tasks, links and markers. Once the
    /// counter reaches `u64::MAX` the lowest free number is used instead.
    pub fn fresh_id(&mut self) -> ItemId {
        let mut n = self.next_uid.max(1);
        while let Some(after) = n.checked_add(1) {
            let candidate = ItemId::from(n);
            self.next_uid = after;
            n = after;
            if !self.id_taken(&candidate) {
                return candidate;
            }
        }
        let free = (1..=u64::MAX)
            .find(|n| !self.id_taken(&ItemId::from(*n)))
            .unwrap_or(u64::MAX);
        ItemId::from(free)
    }

    fn id_taken(&self, id: &ItemId) -> bool {
        self.tasks.contains_key(id) || self.links.contains_key(id) || self.markers.contains_key(id)
    }

    fn bump_uid(&mut self, id: &ItemId) {
        if let Some(n) = id.as_number() {
            if n >= self.next_uid {
                self.next_uid = n.saturating_add(1);
            }
        }
    }

    // ── Tasks ───────────────────────────────────────────────────

    pub fn add_task(&mut self, mut task: Task) -> Result<(), AppError> {
        check_task_fields(&mut task)?;
        if self.tasks.contains_key(&task.id) {
            return Err(AppError::invalid(format!("Task id {} already exists", task.id)));
        }
        if !task.parent.is_root() && !self.tasks.contains_key(&task.parent) {
            return Err(AppError::invalid(format!("Parent task {} does not exist", task.parent)));
        }
        self.bump_uid(&task.id);
        self.tasks.insert(task.id.clone(), task);
        Ok(())
    }

    pub fn update_task(&mut self, id: &ItemId, patch: TaskPatch) -> Result<(), AppError> {
        let current = self
            .tasks
            .get(id)
            .ok_or_else(|| AppError::not_found(format!("Task {id}")))?;
        if patch.is_empty() {
            return Err(AppError::invalid("update_task needs at least one field to change"));
        }

        let has_children = self.has_children(id);
        let mut updated = current.clone();

        if let Some(text) = patch.text {
            updated.text = text;
        }
        if let Some(kind) = patch.kind {
            if kind == TaskKind::Milestone && has_children {
                return Err(AppError::invalid(format!(
                    "Task {id} has subtasks and cannot become a milestone"
                )));
            }
            updated.kind = kind;
            if kind == TaskKind::Milestone {
                updated.duration = 0;
            } else if updated.duration < 1 {
                updated.duration = 1;
            }
        }
        if let Some(duration) = patch.duration {
            if has_children {
                return Err(AppError::invalid(format!(
                    "Duration of summary task {id} is derived from its subtasks"
                )));
            }
            updated.duration = duration;
        }
        if let Some(progress) = patch.progress {
            updated.progress = progress;
        }
        if let Some(parent) = patch.parent {
            if &parent == id {
                return Err(AppError::invariant(format!("Task {id} cannot be its own parent")));
            }
            if !parent.is_root() {
                if !self.tasks.contains_key(&parent) {
                    return Err(AppError::invalid(format!("Parent task {parent} does not exist")));
                }
                if self.is_ancestor(id, &parent) {
                    return Err(AppError::invariant(format!(
                        "Moving task {id} under {parent} would create a cycle"
                    )));
                }
            }
            updated.parent = parent;
        }
        check_task_fields(&mut updated)?;

        let shift = patch
            .start_date
            .map(|start| (start - updated.start_date).num_days())
            .filter(|d| *d != 0);
        if let Some(task) = self.tasks.get_mut(id) {
            *task = updated;
        }
        if let Some(days) = shift {
            self.shift_subtree(id, days);
        }
        Ok(())
    }

    /// Move a task (and, for summaries, its whole subtree) to start on `start`.
    pub fn move_task(&mut self, id: &ItemId, start: NaiveDate) -> Result<(), AppError> {
        let current = self
            .tasks
            .get(id)
            .ok_or_else(|| AppError::not_found(format!("Task {id}")))?;
        let days = (start - current.start_date).num_days();
        if days != 0 {
            self.shift_subtree(id, days);
        }
        Ok(())
    }

    fn shift_subtree(&mut self, id: &ItemId, days: i64) {
        let mut affected = self.descendants_of(id);
        affected.push(id.clone());
        for tid in &affected {
            if let Some(task) = self.tasks.get_mut(tid) {
                task.start_date = shift_date(task.start_date, days);
            }
        }
    }

    /// Remove a task, all its descendants and every link touching them.
    pub fn delete_task(&mut self, id: &ItemId) -> Result<Removal, AppError> {
        if !self.tasks.contains_key(id) {
            return Err(AppError::not_found(format!("Task {id}")));
        }
        let mut removed = vec![id.clone()];
        removed.extend(self.descendants_of(id));
        let doomed: HashSet<&ItemId> = removed.iter().collect();

        let links: Vec<ItemId> = self
            .links
            .values()
            .filter(|l| doomed.contains(&l.source) || doomed.contains(&l.target))
            .map(|l| l.id.clone())
            .collect();
        for lid in &links {
            self.links.shift_remove(lid);
        }
        for tid in &removed {
            self.tasks.shift_remove(tid);
        }
        Ok(Removal {
            tasks: removed,
            links,
        })
    }

    pub fn paint_task(&mut self, id: &ItemId, paint: TaskPaint, color: &str) -> Result<(), AppError> {
        let task = self
            .tasks
            .get_mut(id)
            .ok_or_else(|| AppError::not_found(format!("Task {id}")))?;
        paint.apply(task, color);
        Ok(())
    }

    /// Apply a color to every task; returns how many were painted.
    pub fn paint_all_tasks(&mut self, paint: TaskPaint, color: &str) -> usize {
        for task in self.tasks.values_mut() {
            paint.apply(task, color);
        }
        self.tasks.len()
    }

    pub fn open_task(&mut self, id: &ItemId) {
        if let Some(task) = self.tasks.get_mut(id) {
            task.open = true;
        }
    }

    // ── Links ───────────────────────────────────────────────────

    pub fn add_link(&mut self, link: Link) -> Result<(), AppError> {
        if self.links.contains_key(&link.id) {
            return Err(AppError::invalid(format!("Link id {} already exists", link.id)));
        }
        for end in [&link.source, &link.target] {
            if !self.tasks.contains_key(end) {
                return Err(AppError::invalid(format!("Link endpoint task {end} does not exist")));
            }
        }
        if link.source == link.target {
            return Err(AppError::invariant(format!("Task {} cannot depend on itself", link.source)));
        }
        if self.is_ancestor(&link.source, &link.target) || self.is_ancestor(&link.target, &link.source) {
            return Err(AppError::invalid(format!(
                "Cannot link task {} to {}: one is a summary containing the other",
                link.source, link.target
            )));
        }
        if self.depends_on(&link.target, &link.source) {
            return Err(AppError::invariant(format!(
                "Link {} -> {} would create a dependency cycle",
                link.source, link.target
            )));
        }
        self.bump_uid(&link.id);
        self.links.insert(link.id.clone(), link);
        Ok(())
    }

    pub fn delete_link(&mut self, id: &ItemId) -> Result<Link, AppError> {
        self.links
            .shift_remove(id)
            .ok_or_else(|| AppError::not_found(format!("Link {id}")))
    }

    pub fn paint_link(&mut self, id: &ItemId, color: &str) -> Result<(), AppError> {
        let link = self
            .links
            .get_mut(id)
            .ok_or_else(|| AppError::not_found(format!("Link {id}")))?;
        link.color = Some(color.to_string());
        Ok(())
    }

    pub fn paint_all_links(&mut self, color: &str) -> usize {
        for link in self.links.values_mut() {
            link.color = Some(color.to_string());
        }
        self.links.len()
    }

    /// True when `to` is reachable from `from` by following links forward.
    fn depends_on(&self, from: &ItemId, to: &ItemId) -> bool {
        let mut seen: HashSet<&ItemId> = HashSet::new();
        let mut stack = vec![from];
        while let Some(current) = stack.pop() {
            if current == to {
                return true;
            }
            if !seen.insert(current) {
                continue;
            }
            stack.extend(self.links.values().filter(|l| &l.source == current).map(|l| &l.target));
        }
        false
    }

    // ── Markers ─────────────────────────────────────────────────

    /// Insert or replace a marker by id. Returns true when one was replaced.
    pub fn upsert_marker(&mut self, marker: Marker) -> bool {
        self.bump_uid(&marker.id);
        self.markers.insert(marker.id.clone(), marker).is_some()
    }

    // ── Whole-project ───────────────────────────────────────────

    /// Remove all tasks, links and markers. The name is kept.
    pub fn clear(&mut self) {
        self.tasks.clear();
        self.links.clear();
        self.markers.clear();
        self.next_uid = 1;
    }

    /// Re-derive task kinds and summary dates. A task with children becomes
    /// a summary spanning them; a summary without children becomes a plain
    /// task. Returns the ids whose kind or dates changed.
    pub fn refresh(&mut self, calendar: &WorkCalendar) -> Vec<ItemId> {
        let index = self.child_index();
        let mut changed: Vec<ItemId> = Vec::new();

        for task in self.tasks.values_mut() {
            let has_children = index.get(&task.id).is_some_and(|c| !c.is_empty());
            let kind = match (has_children, task.kind) {
                (true, _) => TaskKind::Summary,
                (false, TaskKind::Summary) => TaskKind::Task,
                (false, other) => other,
            };
            if kind != task.kind {
                task.kind = kind;
                if kind == TaskKind::Task && task.duration < 1 {
                    task.duration = 1;
                }
                changed.push(task.id.clone());
            }
        }

        let mut summaries: Vec<(usize, ItemId)> = self
            .tasks
            .values()
            .filter(|t| t.kind == TaskKind::Summary)
            .map(|t| (self.depth_of(&t.id), t.id.clone()))
            .collect();
        summaries.sort_by(|a, b| b.0.cmp(&a.0));

        for (_, id) in summaries {
            let Some(children) = index.get(&id) else { continue };
            let mut start: Option<NaiveDate> = None;
            let mut end: Option<NaiveDate> = None;
            for child in children.iter().filter_map(|c| self.tasks.get(c)) {
                let child_end = child.end_date(calendar);
                start = Some(start.map_or(child.start_date, |s| s.min(child.start_date)));
                end = Some(end.map_or(child_end, |e| e.max(child_end)));
            }
            let (Some(start), Some(end)) = (start, end) else { continue };
            let duration = calendar.working_days_between(start, end);
            if let Some(task) = self.tasks.get_mut(&id) {
                if task.start_date != start || task.duration != duration {
                    task.start_date = start;
                    task.duration = duration;
                    if !changed.contains(&id) {
                        changed.push(id.clone());
                    }
                }
            }
        }
        changed
    }

    fn child_index(&self) -> HashMap<ItemId, Vec<ItemId>> {
        let mut index: HashMap<ItemId, Vec<ItemId>> = HashMap::new();
        for task in self.tasks.values() {
            index.entry(task.parent.clone()).or_default().push(task.id.clone());
        }
        index
    }

    fn parent_chain_loops(&self, id: &ItemId) -> bool {
        let mut seen: HashSet<&ItemId> = HashSet::new();
        let mut current = id;
        loop {
            if !seen.insert(current) {
                return true;
            }
            match self.tasks.get(current) {
                Some(task) if !task.parent.is_root() => current = &task.parent,
                _ => return false,
            }
        }
    }
}

fn shift_date(date: NaiveDate, days: i64) -> NaiveDate {
    let magnitude = Days::new(days.unsigned_abs());
    let shifted = if days >= 0 {
        date.checked_add_days(magnitude)
    } else {
        date.checked_sub_days(magnitude)
    };
    shifted.unwrap_or(date)
}

/// Field-level checks shared by every path that creates or edits a task.
fn check_task_fields(task: &mut Task) -> Result<(), AppError> {
    if task.id.is_root() {
        return Err(AppError::invalid(format!(
            "Task id {} is reserved for the root",
            task.id
        )));
    }
    task.text = task.text.trim().to_string();
    if task.text.is_empty() {
        return Err(AppError::invalid(format!("Task {} needs a non-empty text", task.id)));
    }
    match task.kind {
        TaskKind::Milestone => task.duration = 0,
        TaskKind::Summary if task.duration >= 0 => {}
        _ if task.duration >= 1 => {}
        _ => {
            return Err(AppError::invalid(format!(
                "Duration of task {} must be a positive whole number of days (got {})",
                task.id, task.duration
            )))
        }
    }
    if !task.progress.is_finite() || !(0.0..=1.0).contains(&task.progress) {
        return Err(AppError::invalid(format!(
            "Progress of task {} must be between 0 and 1 (got {})",
            task.id, task.progress
        )));
    }
    Ok(())
}
