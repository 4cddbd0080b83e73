use std::io::Write;
use std::path::Path;
use std::process::{Command, Stdio};

use regex::Regex;

use crate::error::ScriptError;

/// One parser result: an absolute tree path and its nullable value.
#[derive(Debug, Clone, PartialEq)]
pub struct PathValue {
    pub path: String,
    pub value: Option<String>,
}

impl PathValue {
    pub fn new(path: impl Into<String>, value: Option<&str>) -> PathValue {
        PathValue {
            path: path.into(),
            value: value.map(str::to_string),
        }
    }
}

/// Drives the parser's command-line tool in a scripted batch session. The
/// calls made into it are exactly: apply a lens transform, load a file,
/// move the loaded subtree, and enumerate `/files` descendants with their
/// values; lens inference for `--target` reads the load metadata.
pub struct Augtool {
    program: String,
    loadpath: Option<String>,
    autoload: bool,
    commands: Vec<String>,
    print_line: Regex,
}

impl Augtool {
    pub fn new(loadpath: Option<String>, autoload: bool) -> Augtool {
        Augtool {
            program: "augtool".to_string(),
            loadpath,
            autoload,
            commands: Vec::new(),
            // print output: `/files/etc/hosts/1/ipaddr = "127.0.0.1"`;
            // valueless nodes print the bare path.
            print_line: Regex::new(r#"^(/\S(?:.*?)?) = "(.*)"$"#).expect("static pattern"),
        }
    }

    /// Queue `transform LENS incl FILE` for the batch session.
    pub fn transform(&mut self, lens: &str, file: &Path) {
        self.commands
            .push(format!("transform {} incl {}", lens, file.display()));
    }

    /// Queue loading `file` into the tree.
    pub fn load_file(&mut self, file: &Path) {
        self.commands.push(format!("load-file {}", file.display()));
    }

    /// Queue renaming the loaded subtree (both paths under `/files`).
    pub fn mv(&mut self, src: &str, dst: &str) {
        self.commands.push(format!("mv {} {}", src, dst));
    }

    /// Which lenses would the parser load for `target`? Mirrors the load
    /// metadata query the parser applies to decide inclusion: the target
    /// must match an `incl` glob and no `excl` glob, by full path and by
    /// basename.
    pub fn infer_lens(&self, target: &str) -> Result<Vec<String>, ScriptError> {
        let basename = target.rsplit('/').next().unwrap_or(target);
        let expr = format!(
            "/augeas/load/*['{t}' =~ glob(incl)]['{t}' !~ glob(excl)]['{b}' !~ glob(excl)]",
            t = target,
            b = basename
        );
        let output = self.run(&[format!("match \"{}\"", expr)])?;
        let mut lenses = Vec::new();
        for line in output.lines() {
            if let Some(rest) = line.strip_prefix("/augeas/load/") {
                let name = rest
                    .split([' ', '='])
                    .next()
                    .unwrap_or(rest)
                    .to_string();
                if !name.is_empty() {
                    lenses.push(name);
                }
            }
        }
        Ok(lenses)
    }

    /// Run the queued session, check the parser's error records, and parse
    /// the `/files` descendant dump in document order.
    pub fn dump(&mut self, input: &Path) -> Result<Vec<PathValue>, ScriptError> {
        let mut commands = std::mem::take(&mut self.commands);
        commands.push("print /augeas//error".to_string());
        commands.push("print /files".to_string());
        let output = self.run(&commands)?;

        let mut errors = Vec::new();
        let mut pairs = Vec::new();
        for line in output.lines() {
            if line.is_empty() {
                continue;
            }
            if line.starts_with("/augeas") {
                if let Some(caps) = self.print_line.captures(line) {
                    if caps[1].ends_with("/error")
                        || caps[1].ends_with("/message")
                        || caps[1].ends_with("/lens")
                    {
                        errors.push(unescape(&caps[2]));
                    }
                }
                continue;
            }
            if line == "/files" || !line.starts_with("/files") {
                continue;
            }
            match self.print_line.captures(line) {
                Some(caps) => pairs.push(PathValue {
                    path: caps[1].to_string(),
                    value: Some(unescape(&caps[2])),
                }),
                None => pairs.push(PathValue {
                    path: line.to_string(),
                    value: None,
                }),
            }
        }
        if !errors.is_empty() {
            return Err(ScriptError::LoadFailed {
                path: input.to_path_buf(),
                detail: errors.join("; "),
            });
        }
        if pairs.is_empty() {
            return Err(ScriptError::LoadFailed {
                path: input.to_path_buf(),
                detail: "no tree was built (check that the file exists and a lens applies)"
                    .to_string(),
            });
        }
        Ok(pairs)
    }

    fn run(&self, commands: &[String]) -> Result<String, ScriptError> {
        let mut cmd = Command::new(&self.program);
        cmd.arg("--noload");
        if !self.autoload {
            cmd.arg("--noautoload");
        }
        if let Some(loadpath) = &self.loadpath {
            cmd.arg("--include").arg(loadpath);
        }
        let mut child = cmd
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| ScriptError::Tool(format!("cannot spawn {}: {}", self.program, e)))?;
        {
            let stdin = child.stdin.as_mut().expect("piped stdin");
            for command in commands {
                writeln!(stdin, "{}", command)?;
            }
            writeln!(stdin, "quit")?;
        }
        let output = child.wait_with_output()?;
        let stderr = String::from_utf8_lossy(&output.stderr);
        if !output.status.success() {
            let detail = if stderr.trim().is_empty() {
                format!("exited with {}", output.status)
            } else {
                stderr.trim().to_string()
            };
            return Err(ScriptError::Tool(detail));
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

/// Undo the print format's escaping of quoted values.
fn unescape(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut chars = value.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some(other) => out.push(other),
            None => out.push('\\'),
        }
    }
    out
}
