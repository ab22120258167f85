//! Forward-pass auto-scheduling.
//!
//! Links are lower bounds: a task is only ever pushed later, never pulled
//! earlier. Tasks are visited in dependency order; summary targets move with
//! their whole subtree. Moves feed back into summary roll-ups, so the pass
//! repeats until nothing moves.

use std::collections::{HashMap, HashSet, VecDeque};

use chrono::NaiveDate;

use crate::error::AppError;
use crate::model::{ItemId, Link, LinkKind, Project, Task, WorkCalendar};

/// Reschedule the project. With an `anchor`, only tasks downstream of it
/// (through links) may move. Returns the ids that were moved, in order.
pub fn forward_pass(
    project: &mut Project,
    calendar: &WorkCalendar,
    anchor: Option<&ItemId>,
) -> Result<Vec<ItemId>, AppError> {
    if let Some(a) = anchor {
        if !project.has_task(a) {
            return Err(AppError::not_found(format!("Anchor task {a}")));
        }
    }

    let order = dependency_order(project)?;
    let movable: Option<HashSet<ItemId>> = anchor.map(|a| downstream_of(project, a));

    let mut moved: Vec<ItemId> = Vec::new();
    let max_passes = project.task_count() + 1;
    project.refresh(calendar);

    for _ in 0..max_passes {
        let mut changed = false;
        for id in &order {
            if movable.as_ref().is_some_and(|m| !m.contains(id)) {
                continue;
            }
            let Some(task) = project.get_task(id) else { continue };
            let Some(earliest) = earliest_start(project, calendar, task) else { continue };
            if earliest > task.start_date {
                project.move_task(id, earliest)?;
                project.refresh(calendar);
                if !moved.contains(id) {
                    moved.push(id.clone());
                }
                changed = true;
            }
        }
        if !changed {
            return Ok(moved);
        }
    }
    Err(AppError::invariant(
        "Schedule does not settle; check links between summaries and their own subtasks",
    ))
}

/// The latest lower bound imposed on `task` by its incoming links.
fn earliest_start(project: &Project, calendar: &WorkCalendar, task: &Task) -> Option<NaiveDate> {
    project
        .links()
        .filter(|l| l.target == task.id)
        .filter_map(|l| {
            let source = project.get_task(&l.source)?;
            Some(constraint(calendar, l, source, task))
        })
        .max()
}

fn constraint(calendar: &WorkCalendar, link: &Link, source: &Task, target: &Task) -> NaiveDate {
    let source_end = source.end_date(calendar);
    let target_len = if target.kind == crate::model::TaskKind::Milestone {
        0
    } else {
        target.duration
    };
    match link.kind {
        LinkKind::FinishToStart => {
            calendar.next_working_day(calendar.add_working_days(source_end, link.lag))
        }
        LinkKind::StartToStart => {
            calendar.next_working_day(calendar.add_working_days(source.start_date, link.lag))
        }
        LinkKind::FinishToFinish => {
            calendar.sub_working_days(calendar.add_working_days(source_end, link.lag), target_len)
        }
        LinkKind::StartToFinish => calendar.sub_working_days(
            calendar.add_working_days(source.start_date, link.lag),
            target_len,
        ),
    }
}

/// Kahn topological order over the link graph, ties broken by insertion order.
fn dependency_order(project: &Project) -> Result<Vec<ItemId>, AppError> {
    let mut indegree: HashMap<&ItemId, usize> = project.tasks().map(|t| (&t.id, 0)).collect();
    let mut outgoing: HashMap<&ItemId, Vec<&ItemId>> = HashMap::new();
    for link in project.links() {
        if let Some(d) = indegree.get_mut(&link.target) {
            *d += 1;
        }
        outgoing.entry(&link.source).or_default().push(&link.target);
    }

    let mut ready: VecDeque<&ItemId> = project
        .tasks()
        .map(|t| &t.id)
        .filter(|id| indegree.get(id) == Some(&0))
        .collect();
    let mut order = Vec::with_capacity(project.task_count());
    while let Some(id) = ready.pop_front() {
        order.push(id.clone());
        for next in outgoing.get(id).into_iter().flatten() {
            if let Some(d) = indegree.get_mut(next) {
                *d -= 1;
                if *d == 0 {
                    ready.push_back(*next);
                }
            }
        }
    }

    if order.len() != project.task_count() {
        return Err(AppError::invariant("Links form a dependency cycle"));
    }
    Ok(order)
}

/// Tasks reachable from `anchor` through links (and subtree membership of
/// reached summaries), excluding the anchor and its own subtree.
fn downstream_of(project: &Project, anchor: &ItemId) -> HashSet<ItemId> {
    let mut pinned: HashSet<ItemId> = project.descendants_of(anchor).into_iter().collect();
    pinned.insert(anchor.clone());

    let mut reached: HashSet<ItemId> = HashSet::new();
    let mut queue: VecDeque<ItemId> = pinned.iter().cloned().collect();
    while let Some(id) = queue.pop_front() {
        for link in project.links().filter(|l| l.source == id) {
            let mut group = vec![link.target.clone()];
            group.extend(project.descendants_of(&link.target));
            for member in group {
                if !pinned.contains(&member) && reached.insert(member.clone()) {
                    queue.push_back(member);
                }
            }
        }
    }
    reached
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use crate::model::{Task, TaskPatch};

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 7, d).unwrap()
    }

    fn task(id: u64, start: u32, duration: i64) -> Task {
        Task::new(ItemId::from(id), format!("T{id}"), day(start), duration)
    }

    fn link(id: u64, s: u64, t: u64, kind: LinkKind, lag: i64) -> Link {
        let mut l = Link::new(ItemId::from(id), ItemId::from(s), ItemId::from(t), kind);
        l.lag = lag;
        l
    }

    fn start_of(p: &Project, id: u64) -> NaiveDate {
        p.get_task(&ItemId::from(id)).unwrap().start_date
    }

    #[test]
    fn finish_to_start_pushes_successor() {
        let mut p = Project::from_parts(
            vec![task(1, 1, 2), task(2, 1, 1), task(3, 1, 1)],
            vec![
                link(10, 1, 2, LinkKind::FinishToStart, 0),
                link(11, 2, 3, LinkKind::FinishToStart, 0),
            ],
        )
        .unwrap();
        let moved = forward_pass(&mut p, &WorkCalendar::default(), None).unwrap();
        assert_eq!(start_of(&p, 2), day(3));
        assert_eq!(start_of(&p, 3), day(4));
        assert_eq!(moved, vec![ItemId::from(2), ItemId::from(3)]);
    }

    #[test]
    fn never_pulls_tasks_earlier() {
        let mut p = Project::from_parts(
            vec![task(1, 1, 1), task(2, 20, 1)],
            vec![link(10, 1, 2, LinkKind::FinishToStart, 0)],
        )
        .unwrap();
        let moved = forward_pass(&mut p, &WorkCalendar::default(), None).unwrap();
        assert!(moved.is_empty());
        assert_eq!(start_of(&p, 2), day(20));
    }

    #[test]
    fn lag_and_weekends_are_respected() {
        // Thu 17th for two days ends Friday; the one-day lag consumes Monday.
        let mut p = Project::from_parts(
            vec![task(1, 17, 2), task(2, 1, 1)],
            vec![link(10, 1, 2, LinkKind::FinishToStart, 1)],
        )
        .unwrap();
        forward_pass(&mut p, &WorkCalendar::from_hidden([0, 6]), None).unwrap();
        assert_eq!(start_of(&p, 2), day(22));
    }

    #[test]
    fn start_and_finish_constraints() {
        let mut p = Project::from_parts(
            vec![task(1, 10, 5), task(2, 1, 2), task(3, 1, 2)],
            vec![
                link(10, 1, 2, LinkKind::StartToStart, 0),
                link(11, 1, 3, LinkKind::FinishToFinish, 0),
            ],
        )
        .unwrap();
        forward_pass(&mut p, &WorkCalendar::default(), None).unwrap();
        assert_eq!(start_of(&p, 2), day(10));
        // Task 1 ends (exclusive) on the 15th; task 3 must end no earlier.
        assert_eq!(start_of(&p, 3), day(13));
    }

    #[test]
    fn anchor_limits_scope() {
        let mut p = Project::from_parts(
            vec![task(1, 1, 3), task(2, 1, 1), task(3, 1, 3), task(4, 1, 1)],
            vec![
                link(10, 1, 2, LinkKind::FinishToStart, 0),
                link(11, 3, 4, LinkKind::FinishToStart, 0),
            ],
        )
        .unwrap();
        let moved = forward_pass(&mut p, &WorkCalendar::default(), Some(&ItemId::from(1))).unwrap();
        assert_eq!(moved, vec![ItemId::from(2)]);
        assert_eq!(start_of(&p, 4), day(1));
    }

    #[test]
    fn summary_target_moves_subtree() {
        let mut p = Project::from_parts(
            vec![
                task(1, 1, 4),
                task(2, 1, 1),
                task(3, 1, 1).with_parent(ItemId::from(2)),
                task(4, 2, 1).with_parent(ItemId::from(2)),
            ],
            vec![link(10, 1, 2, LinkKind::FinishToStart, 0)],
        )
        .unwrap();
        forward_pass(&mut p, &WorkCalendar::default(), None).unwrap();
        assert_eq!(start_of(&p, 3), day(5));
        assert_eq!(start_of(&p, 4), day(6));
        assert_eq!(start_of(&p, 2), day(5));
    }

    #[test]
    fn missing_anchor_is_not_found() {
        let mut p = Project::from_parts(vec![task(1, 1, 1)], vec![]).unwrap();
        let err = forward_pass(&mut p, &WorkCalendar::default(), Some(&ItemId::from(9))).unwrap_err();
        assert!(err.is_soft());
    }

    #[test]
    fn schedule_is_consistent_after_pass() {
        let mut p = Project::from_parts(
            vec![task(1, 1, 2), task(2, 1, 3), task(3, 1, 1)],
            vec![
                link(10, 1, 3, LinkKind::FinishToStart, 0),
                link(11, 2, 3, LinkKind::FinishToStart, 0),
            ],
        )
        .unwrap();
        p.update_task(
            &ItemId::from(1),
            TaskPatch { duration: Some(6), ..TaskPatch::default() },
        )
        .unwrap();
        let cal = WorkCalendar::default();
        forward_pass(&mut p, &cal, None).unwrap();
        for l in p.links() {
            let s = p.get_task(&l.source).unwrap();
            let t = p.get_task(&l.target).unwrap();
            assert!(t.start_date >= s.end_date(&cal));
        }
    }
}
