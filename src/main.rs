//! varc - a virtual archive browser for the terminal
//!
//! Browses archive contents as a lazy virtual filesystem tree, descends
//! into nested archives (each potentially carrying its own password) and
//! keeps a breadcrumb of how it got there.

use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

mod backend;
mod config;
mod errors;
mod manifest;
mod navigation;
mod password;
mod prompt;
mod tree;

use backend::{ArchiveBackend, CliBackend, MemoryBackend};
use config::Config;
use errors::AppResult;
use navigation::{BackendFactory, Navigator};
use password::SessionPasswords;
use prompt::TerminalPrompt;
use tree::{NodeId, NodeKind};

const HELP: &str = "\
Commands:
  ls [path]        list children of a folder (default: root)
  tree             print the whole tree
  cat <entry>      extract an entry and print its contents
  open <entry>     descend into a nested archive
  up               return to the previous archive
  stack            show the breadcrumb stack
  meta             show the archive manifest
  mkdir <parent> <name>   create a folder (use / for the root)
  rm <path>        remove an entry or a whole subtree
  extract <dir>    extract everything into a directory
  help             this text
  quit             leave";

fn usage() {
    eprintln!("Usage: varc <archive> [--password <pw>]");
}

/// Normalize user-typed paths: "/" and "." mean the root
fn clean_path(raw: &str) -> &str {
    let trimmed = raw.trim_matches('/');
    if trimmed == "." { "" } else { trimmed }
}

fn kind_marker(kind: NodeKind) -> &'static str {
    match kind {
        NodeKind::Folder => "/",
        NodeKind::NestedArchive => "  [archive]",
        NodeKind::File => "",
    }
}

fn print_children(nav: &Navigator, id: NodeId) {
    let Some(node) = nav.tree().node(id) else { return };
    for &child in &node.children {
        if let Some(c) = nav.tree().node(child) {
            println!("{}{}", c.name, kind_marker(c.kind));
        }
    }
}

fn print_subtree(nav: &mut Navigator, id: NodeId, depth: usize) -> AppResult<()> {
    let children = match nav.tree().node(id) {
        Some(node) => node.children.clone(),
        None => return Ok(()),
    };
    for child in children {
        let Some(c) = nav.tree().node(child) else { continue };
        println!("{}{}{}", "  ".repeat(depth), c.name, kind_marker(c.kind));
        if c.kind == NodeKind::Folder {
            let child_path = c.full_path.clone();
            nav.expand_path(&child_path)?;
            print_subtree(nav, child, depth + 1)?;
        }
    }
    Ok(())
}

fn dispatch(
    nav: &mut Navigator,
    passwords: &mut SessionPasswords,
    prompt: &mut TerminalPrompt,
    line: &str,
) -> AppResult<bool> {
    let mut words = line.split_whitespace();
    let Some(command) = words.next() else {
        return Ok(true);
    };
    let args: Vec<&str> = words.collect();

    match (command, args.as_slice()) {
        ("ls", []) => {
            let id = nav.expand_path("")?;
            print_children(nav, id);
        }
        ("ls", [path]) => {
            let id = nav.expand_path(clean_path(path))?;
            print_children(nav, id);
        }
        ("tree", []) => {
            nav.expand_path("")?;
            let root = nav.tree().root();
            print_subtree(nav, root, 0)?;
        }
        ("cat", [entry]) => {
            let extracted = nav.read_entry(clean_path(entry))?;
            let data = std::fs::read(&extracted)?;
            io::stdout().write_all(&data)?;
        }
        ("open", [entry]) => {
            nav.expand_path(clean_path(entry))?;
            nav.descend(clean_path(entry), passwords, prompt)?;
            println!("{}", nav.breadcrumb());
        }
        ("up", []) => {
            nav.ascend(passwords, prompt)?;
            println!("{}", nav.breadcrumb());
        }
        ("stack", []) => println!("{}", nav.breadcrumb()),
        ("meta", []) => {
            if let Some(record) = nav.manifest() {
                println!("{}", record.summary());
            }
        }
        ("mkdir", [parent, name]) => {
            let created = nav.make_folder(clean_path(parent), name)?;
            println!("created {created}/");
        }
        ("rm", [path]) => {
            // Make sure the subtree is fully known before collecting it.
            let id = nav.expand_path(clean_path(path))?;
            expand_deep(nav, id)?;
            let removed = nav.remove(clean_path(path))?;
            println!("removed {} entr{}", removed.len(), if removed.len() == 1 { "y" } else { "ies" });
        }
        ("extract", [dest]) => {
            let dest = PathBuf::from(dest);
            std::fs::create_dir_all(&dest)?;
            nav.extract_all(&dest)?;
            println!("extracted into {}", dest.display());
        }
        ("help", _) => println!("{HELP}"),
        ("quit", _) | ("exit", _) => return Ok(false),
        _ => println!("unknown command (try 'help')"),
    }
    Ok(true)
}

/// Recursively populate a subtree so bulk operations see every descendant
fn expand_deep(nav: &mut Navigator, id: NodeId) -> AppResult<()> {
    let children: Vec<String> = {
        let Some(node) = nav.tree().node(id) else { return Ok(()) };
        node.children
            .iter()
            .filter_map(|&c| nav.tree().node(c))
            .filter(|n| n.kind == NodeKind::Folder)
            .map(|n| n.full_path.clone())
            .collect()
    };
    for path in children {
        let child = nav.expand_path(&path)?;
        expand_deep(nav, child)?;
    }
    Ok(())
}

fn run(archive: &Path, seed_password: Option<&str>) -> AppResult<()> {
    let config = Config::load();
    let factory: BackendFactory = {
        let config = config.clone();
        Box::new(move || -> Box<dyn ArchiveBackend> {
            if config.general.backend == "snapshot" {
                Box::new(MemoryBackend::new())
            } else {
                Box::new(CliBackend::new(&config))
            }
        })
    };
    let mut nav = Navigator::new(
        factory,
        &config.general.nested_suffix,
        &config.general.manifest_entry,
    );
    let mut passwords = SessionPasswords::new();
    if let Some(pw) = seed_password {
        passwords.seed(pw);
    }
    let mut prompt = TerminalPrompt;

    nav.open_archive(archive, &mut passwords, &mut prompt)?;
    println!("{}", nav.breadcrumb());

    let stdin = io::stdin();
    loop {
        print!("varc> ");
        io::stdout().flush()?;
        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 {
            break;
        }
        match dispatch(&mut nav, &mut passwords, &mut prompt, &line) {
            Ok(true) => {}
            Ok(false) => break,
            Err(e) => eprintln!("Error: {e}"),
        }
    }
    Ok(())
}

fn main() -> ExitCode {
    let args: Vec<String> = std::env::args().skip(1).collect();

    let mut archive: Option<PathBuf> = None;
    let mut seed_password: Option<String> = None;
    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--password" | "-p" => match iter.next() {
                Some(pw) => seed_password = Some(pw.clone()),
                None => {
                    usage();
                    return ExitCode::FAILURE;
                }
            },
            "--help" | "-h" => {
                usage();
                println!("{HELP}");
                return ExitCode::SUCCESS;
            }
            _ if archive.is_none() => archive = Some(PathBuf::from(arg)),
            _ => {
                usage();
                return ExitCode::FAILURE;
            }
        }
    }

    let Some(archive) = archive else {
        usage();
        return ExitCode::FAILURE;
    };

    match run(&archive, seed_password.as_deref()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}
