//! `rsync` over `ssh`.

use std::borrow::Cow;
use std::path::Path;

use super::RemoteHost;
use crate::error::BuildError;
use crate::log;
use crate::utils::exec::{Cmd, SSH_FILTER, require_program};

/// Build the transfer command for `local_root` -> `target`.
///
/// The trailing `/` on the source copies the directory's contents, not the
/// directory itself. Remote files absent locally are left in place.
pub fn rsync_command(local_root: &Path, target: &RemoteHost, excludes: &[String]) -> Cmd {
    let key = target.key_path.to_string_lossy();
    let ssh = format!("ssh -i {} -p {} -o BatchMode=yes", quote_arg(&key), target.port);

    let mut source = local_root.as_os_str().to_owned();
    if !local_root.as_os_str().to_string_lossy().ends_with('/') {
        source.push("/");
    }

    Cmd::new("rsync")
        .arg("-az")
        .args(excludes.iter().map(|pattern| format!("--exclude={pattern}")))
        .args(["-e", ssh.as_str()])
        .arg(source)
        .arg(target.destination())
}

/// Quote one word of the `-e` command. rsync splits it on spaces and joins
/// adjacent quoted runs, so an embedded `'` is written as `'"'"'`.
fn quote_arg(word: &str) -> Cow<'_, str> {
    if word.contains(|c: char| c.is_whitespace() || c == '\'' || c == '"') {
        Cow::Owned(format!("'{}'", word.replace('\'', r#"'"'"'"#)))
    } else {
        Cow::Borrowed(word)
    }
}

/// Transfer `local_root` to the remote host. Fails on any non-zero exit.
pub fn publish_to_filesystem(
    local_root: &Path,
    target: &RemoteHost,
    excludes: &[String],
) -> Result<(), BuildError> {
    let destination = target.destination();
    for program in ["rsync", "ssh"] {
        require_program(program)
            .map_err(|e| BuildError::transport(destination.clone(), e.to_string()))?;
    }

    log!("publish:remote"; "{} -> {destination}", local_root.display());
    rsync_command(local_root, target, excludes)
        .filter(&SSH_FILTER)
        .run()
        .map_err(|e| BuildError::transport(destination.clone(), format!("{e:#}")))?;
    log!("publish:remote"; "done");
    Ok(())
}
