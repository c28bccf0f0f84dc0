//! Working out which container, if any, we are running in

use regex::Regex;
use std::{
    ffi::CStr,
    fs::File,
    io::{BufRead, BufReader},
    path::PathBuf,
};

/// One way of finding our own container id
#[derive(Clone, Debug)]
pub enum Probe {
    /// Engines set the hostname to the short container id unless something
    /// else overrides it, so only a hostname that looks like an id counts
    Hostname,
    /// cgroup v1 cpuset file of pid 1, `/docker/<id>`
    Cpuset(PathBuf),
    /// mountinfo of this process, which lists per-container files mounted
    /// from `/docker/containers/<id>/`
    MountInfo(PathBuf),
}

impl Probe {
    /// The probes tried when nothing else is specified, in order
    pub fn defaults() -> Vec<Probe> {
        vec![
            Probe::Hostname,
            Probe::Cpuset(PathBuf::from("/proc/1/cpuset")),
            Probe::MountInfo(PathBuf::from("/proc/self/mountinfo")),
        ]
    }

    pub fn run(&self) -> Option<String> {
        match self {
            Probe::Hostname => hostname().and_then(|name| hostname_id(&name)),
            Probe::Cpuset(path) => std::fs::read_to_string(path)
                .ok()
                .and_then(|contents| cpuset_id(&contents)),
            Probe::MountInfo(path) => {
                let file = File::open(path).ok()?;
                BufReader::new(file)
                    .lines()
                    .filter_map(Result::ok)
                    .find_map(|line| mountinfo_id(&line))
            }
        }
    }
}

/// Our own container id, as far as we could tell
///
/// An empty [SelfId] never matches anything, which is the safe default: with
/// no idea who we are, no container gets the self-update treatment.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct SelfId(Option<String>);

impl SelfId {
    /// Run the default probes
    pub fn detect() -> Self {
        SelfId::detect_with(&Probe::defaults())
    }

    /// Run probes in order, keeping the first answer
    pub fn detect_with(probes: &[Probe]) -> Self {
        for probe in probes {
            if let Some(id) = probe.run() {
                log::debug!("self id {} found by {:?}", id, probe);
                return SelfId(Some(id));
            }
        }
        log::debug!("not running in a detectable container");
        SelfId(None)
    }

    pub fn none() -> Self {
        SelfId(None)
    }

    pub fn as_str(&self) -> Option<&str> {
        self.0.as_deref()
    }

    /// Does this container id belong to us?
    ///
    /// A short id detected from the hostname is matched as a prefix of the
    /// full id. Two containers sharing a 12 character prefix would confuse
    /// this, which we accept.
    pub fn matches(&self, container_id: &str) -> bool {
        match &self.0 {
            None => false,
            Some(id) => container_id == id || container_id.starts_with(id.as_str()),
        }
    }
}

impl From<String> for SelfId {
    fn from(id: String) -> Self {
        if id.is_empty() {
            SelfId(None)
        } else {
            SelfId(Some(id))
        }
    }
}

fn hostname() -> Option<String> {
    let mut buf = [0 as libc::c_char; 256];
    let result = unsafe { libc::gethostname(buf.as_mut_ptr(), buf.len()) };
    if result != 0 {
        return None;
    }
    buf[buf.len() - 1] = 0;
    let name = unsafe { CStr::from_ptr(buf.as_ptr()) };
    name.to_str().ok().map(str::to_owned)
}

/// Accept a hostname only if it is exactly 12 lowercase hex characters
pub fn hostname_id(hostname: &str) -> Option<String> {
    let is_short_id = hostname.len() == 12
        && hostname
            .bytes()
            .all(|c| matches!(c, b'0'..=b'9' | b'a'..=b'f'));
    if is_short_id {
        Some(hostname.to_owned())
    } else {
        None
    }
}

fn cpuset_id(contents: &str) -> Option<String> {
    let id = contents.trim().strip_prefix("/docker/")?;
    if id.is_empty() {
        None
    } else {
        Some(id.to_owned())
    }
}

fn mountinfo_id(line: &str) -> Option<String> {
    lazy_static! {
        static ref RE: Regex = Regex::new("/docker/containers/(?P<id>[a-f0-9]{64})/").unwrap();
    }
    RE.captures(line).map(|captures| captures["id"].to_owned())
}
