use std::io::{IsTerminal, Write};

use anyhow::anyhow;
use chrono::NaiveDate;
use unicode_width::UnicodeWidthStr;

use crate::app_data::AppData;
use crate::config::Config;
use crate::datetime::display_timestamp;
use crate::id::short_id;
use crate::note::{Note, walk};
use crate::note_renderer::NoteRenderer;
use crate::project::{Project, ProjectCategory};
use crate::scratchpad::ScratchpadField;
use crate::task::{Task, TaskPriority, TaskStatus};
use crate::todo::{TodoItem, TodoState};
use crate::validate::{Severity, Violation};

#[derive(Debug, Clone)]
pub struct Renderer {
    color: bool,
    notes: NoteRenderer,
}

impl Renderer {
    pub fn new(cfg: &Config) -> anyhow::Result<Self> {
        let color_cfg = cfg.get("color").unwrap_or_else(|| "on".to_string());
        let color = match color_cfg.to_ascii_lowercase().as_str() {
            "on" | "yes" | "true" | "1" => true,
            "off" | "no" | "false" | "0" => false,
            other => return Err(anyhow!("invalid color setting: {other}")),
        };
        let notes = match cfg.get_usize("note.indent") {
            Some(indent) => NoteRenderer::with_indent(indent),
            None => NoteRenderer::default(),
        };

        Ok(Self {
            color: color && std::io::stdout().is_terminal(),
            notes,
        })
    }

    /// No colour, default note layout.
    pub fn plain() -> Self {
        Self {
            color: false,
            notes: NoteRenderer::default(),
        }
    }

    #[tracing::instrument(skip_all, fields(count = projects.len()))]
    pub fn project_table(
        &self,
        out: &mut dyn Write,
        data: &AppData,
        projects: &[&Project],
    ) -> anyhow::Result<()> {
        if projects.is_empty() {
            writeln!(out, "No projects.")?;
            return Ok(());
        }

        let headers = ["ID", "Name", "Status", "Pri", "Categories", "Tasks"];
        let mut rows = Vec::with_capacity(projects.len());
        for project in projects {
            let tasks = data.tasks_for_project(&project.id);
            let done = tasks.iter().filter(|t| t.status == TaskStatus::Done).count();
            rows.push(vec![
                self.paint(short_id(&project.id), "33"),
                project.name.clone(),
                project.status.to_string(),
                project.priority.to_string(),
                category_names(data, project),
                format!("{done}/{}", tasks.len()),
            ]);
        }

        write_table(out, &headers, rows)
    }

    #[tracing::instrument(skip_all, fields(count = tasks.len()))]
    pub fn task_table(
        &self,
        out: &mut dyn Write,
        data: &AppData,
        tasks: &[&Task],
        today: NaiveDate,
    ) -> anyhow::Result<()> {
        if tasks.is_empty() {
            writeln!(out, "No tasks.")?;
            return Ok(());
        }

        let headers = ["ID", "Status", "Pri", "Deadline", "Pts", "Project", "Title"];
        let mut rows = Vec::with_capacity(tasks.len());
        for task in tasks {
            let deadline = task.deadline.clone().unwrap_or_default();
            let deadline = if task.is_overdue(today) {
                self.paint(&deadline, "31")
            } else {
                deadline
            };
            let project = data
                .project(&task.project_id)
                .map(|p| p.name.clone())
                .unwrap_or_else(|| "?".to_string());
            rows.push(vec![
                self.paint(short_id(&task.id), "33"),
                task.status.to_string(),
                self.priority(task.priority),
                deadline,
                task.story_points.to_string(),
                project,
                task.title.clone(),
            ]);
        }

        write_table(out, &headers, rows)
    }

    #[tracing::instrument(skip_all, fields(id = %task.id))]
    pub fn task_info(
        &self,
        out: &mut dyn Write,
        data: &AppData,
        task: &Task,
        today: NaiveDate,
    ) -> anyhow::Result<()> {
        let project = data
            .project(&task.project_id)
            .map(|p| p.name.as_str())
            .unwrap_or("?");

        writeln!(out, "id        {}", task.id)?;
        writeln!(out, "title     {}", task.title)?;
        writeln!(out, "project   {project}")?;
        writeln!(out, "status    {}", task.status)?;
        writeln!(out, "priority  {}", self.priority(task.priority))?;
        writeln!(out, "points    {}", task.story_points)?;
        if let Some(deadline) = &task.deadline {
            let flag = if task.is_overdue(today) {
                self.paint(" (overdue)", "31")
            } else {
                String::new()
            };
            writeln!(out, "deadline  {deadline}{flag}")?;
        }
        if let Some(link) = &task.link {
            writeln!(out, "link      {link}")?;
        }
        if !task.description.is_empty() {
            writeln!(out, "desc      {}", task.description)?;
        }

        if !task.subtasks.is_empty() {
            let progress = task.progress().unwrap_or(0.0) * 100.0;
            writeln!(
                out,
                "\nsubtasks  {:.0}% ({}/{} pts)",
                progress,
                task.completed_points(),
                task.total_subtask_points()
            )?;
            for subtask in &task.subtasks {
                let mark = if subtask.is_completed { "x" } else { " " };
                writeln!(
                    out,
                    "  [{mark}] {} {} ({} pts)",
                    self.paint(short_id(&subtask.id), "33"),
                    subtask.title,
                    subtask.story_points
                )?;
            }
        }

        if !task.logs.is_empty() {
            writeln!(out, "\nlogs")?;
            for log in &task.logs {
                writeln!(
                    out,
                    "  {} {}  {}",
                    self.paint(short_id(&log.id), "33"),
                    display_timestamp(&log.created_at),
                    log.content
                )?;
            }
        }

        Ok(())
    }

    #[tracing::instrument(skip_all, fields(id = %project.id))]
    pub fn project_info(
        &self,
        out: &mut dyn Write,
        data: &AppData,
        project: &Project,
        today: NaiveDate,
    ) -> anyhow::Result<()> {
        writeln!(out, "id          {}", project.id)?;
        writeln!(out, "name        {}", project.name)?;
        writeln!(out, "status      {}", project.status)?;
        writeln!(out, "priority    {}", project.priority)?;
        writeln!(out, "categories  {}", category_names(data, project))?;
        if !project.description.is_empty() {
            writeln!(out, "desc        {}", project.description)?;
        }

        writeln!(out)?;
        self.task_table(out, data, &data.tasks_for_project(&project.id), today)?;

        if !project.notes.is_empty() {
            writeln!(out, "\nnotes")?;
            self.note_tree(out, project, false)?;
        }
        Ok(())
    }

    /// Indented outline; `+` marks a collapsed note with hidden children.
    pub fn note_tree(
        &self,
        out: &mut dyn Write,
        project: &Project,
        expand_all: bool,
    ) -> anyhow::Result<()> {
        if project.notes.is_empty() {
            writeln!(out, "No notes.")?;
            return Ok(());
        }
        for row in walk(&project.notes, expand_all) {
            let marker = match (row.has_children, row.note.is_collapsed() && !expand_all) {
                (true, true) => "+",
                (true, false) => "-",
                (false, _) => " ",
            };
            let main = if row.note.is_main() {
                self.paint(" *", "32")
            } else {
                String::new()
            };
            writeln!(
                out,
                "{}{marker} {} {}{main}",
                "  ".repeat(row.depth),
                self.paint(short_id(&row.note.id), "33"),
                row.note.title
            )?;
        }
        Ok(())
    }

    pub fn note_view(&self, out: &mut dyn Write, note: &Note) -> anyhow::Result<()> {
        writeln!(out, "{}", self.paint(&note.title, "1"))?;
        let lines = self.notes.render(&note.content);
        if lines.is_empty() {
            return Ok(());
        }
        writeln!(out)?;
        for line in lines {
            writeln!(out, "{line}")?;
        }
        Ok(())
    }

    pub fn category_table(
        &self,
        out: &mut dyn Write,
        categories: &[ProjectCategory],
    ) -> anyhow::Result<()> {
        if categories.is_empty() {
            writeln!(out, "No categories.")?;
            return Ok(());
        }
        let rows = categories
            .iter()
            .map(|c| {
                vec![
                    self.paint(short_id(&c.id), "33"),
                    c.name.clone(),
                    c.color.clone(),
                ]
            })
            .collect();
        write_table(out, &["ID", "Name", "Color"], rows)
    }

    /// Active todos in their explicit order, then the backlog.
    #[tracing::instrument(skip_all)]
    pub fn todo_list(&self, out: &mut dyn Write, state: &TodoState) -> anyhow::Result<()> {
        let active = state.active_todos();
        let backlog = state.backlog_todos();
        if active.is_empty() && backlog.is_empty() {
            writeln!(out, "No todos.")?;
            return Ok(());
        }

        let headers = ["#", "ID", "Done", "Category", "Text"];
        if !active.is_empty() {
            writeln!(out, "{}", self.paint("Active", "1"))?;
            let rows = active
                .iter()
                .enumerate()
                .map(|(idx, todo)| self.todo_row((idx + 1).to_string(), state, todo))
                .collect();
            write_table(out, &headers, rows)?;
        }
        if !backlog.is_empty() {
            if !active.is_empty() {
                writeln!(out)?;
            }
            writeln!(out, "{}", self.paint("Backlog", "1"))?;
            let rows = backlog
                .iter()
                .map(|todo| self.todo_row(String::new(), state, todo))
                .collect();
            write_table(out, &headers, rows)?;
        }
        Ok(())
    }

    pub fn todo_info(
        &self,
        out: &mut dyn Write,
        state: &TodoState,
        todo: &TodoItem,
    ) -> anyhow::Result<()> {
        let category = state
            .category(&todo.category_id)
            .map(|c| c.name.as_str())
            .unwrap_or("?");
        writeln!(out, "id        {}", todo.id)?;
        writeln!(out, "text      {}", todo.text)?;
        writeln!(out, "category  {category}")?;
        writeln!(out, "status    {}", todo.status)?;
        writeln!(out, "done      {}", if todo.is_done { "yes" } else { "no" })?;
        writeln!(out, "created   {}", display_timestamp(&todo.created_at))?;
        if !todo.notes.is_empty() {
            writeln!(out, "\n{}", todo.notes)?;
        }
        if !todo.logs.is_empty() {
            writeln!(out, "\nlogs")?;
            for log in &todo.logs {
                writeln!(
                    out,
                    "  {} {}  {}",
                    self.paint(short_id(&log.id), "33"),
                    display_timestamp(&log.created_at),
                    log.content
                )?;
            }
        }
        Ok(())
    }

    pub fn todo_categories(&self, out: &mut dyn Write, state: &TodoState) -> anyhow::Result<()> {
        if state.categories.is_empty() {
            writeln!(out, "No todo categories.")?;
            return Ok(());
        }
        let rows = state
            .categories
            .iter()
            .map(|c| {
                let used = state.todos.iter().filter(|t| t.category_id == c.id).count();
                vec![
                    self.paint(short_id(&c.id), "33"),
                    c.name.clone(),
                    c.color.clone(),
                    used.to_string(),
                ]
            })
            .collect();
        write_table(out, &["ID", "Name", "Color", "Todos"], rows)
    }

    pub fn scratchpad(&self, out: &mut dyn Write, field: &ScratchpadField) -> anyhow::Result<()> {
        if field.disabled {
            writeln!(out, "{}", self.paint("(loading)", "2"))?;
        }
        if field.value.is_empty() {
            writeln!(out, "{}", self.paint(field.placeholder, "2"))?;
        } else {
            write!(out, "{}", field.value)?;
            if !field.value.ends_with('\n') {
                writeln!(out)?;
            }
        }
        Ok(())
    }

    pub fn violations(&self, out: &mut dyn Write, violations: &[Violation]) -> anyhow::Result<()> {
        if violations.is_empty() {
            writeln!(out, "No problems found.")?;
            return Ok(());
        }
        for violation in violations {
            let code = match violation.severity {
                Severity::Error => "31",
                Severity::Warning => "33",
            };
            writeln!(out, "{}", self.paint(&violation.to_string(), code))?;
        }
        Ok(())
    }

    fn todo_row(&self, position: String, state: &TodoState, todo: &TodoItem) -> Vec<String> {
        let category = state
            .category(&todo.category_id)
            .map(|c| c.name.clone())
            .unwrap_or_else(|| "?".to_string());
        let text = if todo.is_done {
            self.paint(&todo.text, "9")
        } else {
            todo.text.clone()
        };
        vec![
            position,
            self.paint(short_id(&todo.id), "33"),
            if todo.is_done { "x".to_string() } else { String::new() },
            category,
            text,
        ]
    }

    fn priority(&self, priority: TaskPriority) -> String {
        match priority {
            TaskPriority::High => self.paint(priority.as_str(), "31"),
            TaskPriority::Medium | TaskPriority::Low => priority.as_str().to_string(),
        }
    }

    fn paint(&self, text: &str, code: &str) -> String {
        if !self.color {
            return text.to_string();
        }
        format!("\x1b[{code}m{text}\x1b[0m")
    }
}

fn category_names(data: &AppData, project: &Project) -> String {
    project
        .category_ids()
        .into_iter()
        .map(|id| {
            data.category(id)
                .map(|c| c.name.clone())
                .unwrap_or_else(|| format!("?{}", short_id(id)))
        })
        .collect::<Vec<_>>()
        .join(", ")
}

fn write_table(
    writer: &mut dyn Write,
    headers: &[&str],
    rows: Vec<Vec<String>>,
) -> anyhow::Result<()> {
    let column_count = headers.len();
    let mut widths = vec![0usize; column_count];

    for (idx, header) in headers.iter().enumerate() {
        widths[idx] = widths[idx].max(UnicodeWidthStr::width(*header));
    }

    for row in &rows {
        for (idx, cell) in row.iter().enumerate().take(column_count) {
            widths[idx] = widths[idx].max(UnicodeWidthStr::width(strip_ansi(cell).as_str()));
        }
    }

    let mut line = String::new();
    for (idx, header) in headers.iter().enumerate() {
        line.push_str(&format!("{:width$} ", header, width = widths[idx]));
    }
    writeln!(writer, "{}", line.trim_end())?;

    line.clear();
    for width in &widths {
        line.push_str(&format!("{:-<width$} ", "", width = width));
    }
    writeln!(writer, "{}", line.trim_end())?;

    for row in rows {
        line.clear();
        for (idx, cell) in row.iter().enumerate().take(column_count) {
            let visible_width = UnicodeWidthStr::width(strip_ansi(cell).as_str());
            let padding = widths[idx].saturating_sub(visible_width);
            line.push_str(cell);
            line.push_str(&" ".repeat(padding + 1));
        }
        writeln!(writer, "{}", line.trim_end())?;
    }

    Ok(())
}

fn strip_ansi(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut escaped = false;

    for ch in s.chars() {
        if escaped {
            if ch == 'm' {
                escaped = false;
            }
            continue;
        }

        if ch == '\x1b' {
            escaped = true;
            continue;
        }

        out.push(ch);
    }

    out
}

#[cfg(test)]
mod tests {
    use super::{Renderer, strip_ansi, write_table};
    use crate::project::Project;
    use crate::note::Note;

    fn text(buf: Vec<u8>) -> String {
        String::from_utf8(buf).expect("utf8")
    }

    #[test]
    fn table_columns_use_display_width() {
        let mut buf = Vec::new();
        write_table(
            &mut buf,
            &["ID", "Name"],
            vec![
                vec!["1".to_string(), "日本".to_string()],
                vec!["22".to_string(), "x".to_string()],
            ],
        )
        .expect("table");
        assert_eq!(text(buf), "ID Name\n-- ----\n1  日本\n22 x\n");
    }

    #[test]
    fn strips_colour_codes() {
        assert_eq!(strip_ansi("\x1b[33mabc\x1b[0m"), "abc");
    }

    #[test]
    fn note_tree_marks_collapsed_and_main() {
        let mut project = Project::new("P".to_string());
        let mut root = Note::new("Root".to_string(), String::new(), None);
        root.is_collapsed = Some(true);
        root.is_main = Some(true);
        let child = Note::new("Child".to_string(), String::new(), Some(root.id.clone()));
        project.notes = vec![root, child];

        let renderer = Renderer::plain();
        let mut buf = Vec::new();
        renderer.note_tree(&mut buf, &project, false).expect("tree");
        let collapsed = text(buf);
        assert!(collapsed.starts_with("+ "));
        assert!(collapsed.contains("Root *"));
        assert!(!collapsed.contains("Child"));

        let mut buf = Vec::new();
        renderer.note_tree(&mut buf, &project, true).expect("tree");
        let expanded = text(buf);
        assert!(expanded.contains("\n  "));
        assert!(expanded.contains("Child"));
    }

    #[test]
    fn note_view_renders_legacy_and_block_content_alike() {
        let renderer = Renderer::plain();
        let legacy = Note::new("N".to_string(), "hi".to_string(), None);
        let blocks = Note::new(
            "N".to_string(),
            r#"[{"type":"paragraph","content":"hi"}]"#.to_string(),
            None,
        );
        let mut a = Vec::new();
        let mut b = Vec::new();
        renderer.note_view(&mut a, &legacy).expect("legacy");
        renderer.note_view(&mut b, &blocks).expect("blocks");
        assert_eq!(text(a), text(b));
    }
}
