//! Release state machine across tracks
//!
//! Every state-changing operation runs as one edit transaction (open edit,
//! read, write, commit) under the `(package, track)` key lock. The whole
//! transaction is the unit the retry policy repeats; the lock is released
//! before each backoff.
//!
//! Retries are guarded by check-before-create: uploads are matched by
//! SHA-256 against binaries the service already holds. Once an attempt has
//! sent a commit, later attempts re-read the track so a commit whose
//! response was lost is not applied twice.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use playdeck_core::validation::{
    validate_package_name, validate_rollout, validate_tester_groups, validate_track,
};
use playdeck_core::{
    Artifact, BatchDeploymentResult, DeploymentResult, ExpansionFile, ExpansionFileType,
    PublishError, ReleaseNotes, ReleaseStatus, Result, RolloutPercentage, Testers, Track,
    TrackOutcome, TrackReleases, ValidationIssue, ValidationReport,
};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{debug, info, warn};

use crate::api::{TrackRelease, TrackState};
use crate::client::{ApiClient, ApiSession};
use crate::locks::KeyedLocks;

/// Serialization key for state-changing operations
pub type ReleaseKey = (String, Track);

/// Release notes as supplied by a caller
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ReleaseNotesInput {
    /// One text, tagged with the default language
    Text(String),
    /// Language code to text
    Localized(ReleaseNotes),
}

impl ReleaseNotesInput {
    pub fn resolve(&self, default_language: &str) -> ReleaseNotes {
        match self {
            Self::Text(text) if text.is_empty() => ReleaseNotes::new(),
            Self::Text(text) => ReleaseNotes::single(default_language, text.clone()),
            Self::Localized(notes) => notes.clone(),
        }
    }
}

/// Upload an artifact and release it on a track
#[derive(Debug, Clone)]
pub struct DeployRequest {
    pub package_name: String,
    pub track: String,
    pub artifact: PathBuf,
    pub release_notes: Option<ReleaseNotesInput>,
    pub rollout_percentage: f64,
}

/// Copy a released version from one track to another
#[derive(Debug, Clone)]
pub struct PromoteRequest {
    pub package_name: String,
    pub from_track: String,
    pub to_track: String,
    pub version_code: i64,
    pub rollout_percentage: f64,
}

/// Deploy one artifact to several tracks
#[derive(Debug, Clone)]
pub struct BatchDeployRequest {
    pub package_name: String,
    pub artifact: PathBuf,
    pub tracks: Vec<String>,
    pub release_notes: Option<ReleaseNotesInput>,
    /// Rollout for tracks without an entry in `track_rollouts`
    pub rollout_percentage: f64,
    pub track_rollouts: BTreeMap<String, f64>,
}

impl BatchDeployRequest {
    pub fn rollout_for(&self, track: &str) -> f64 {
        self.track_rollouts
            .get(track)
            .copied()
            .unwrap_or(self.rollout_percentage)
    }
}

/// Result of staging changes inside an edit
enum Staged<T = TrackRelease> {
    /// Changes were written and the edit must be committed
    Write(T),
    /// A previous attempt already applied the change; nothing to commit
    Unchanged(T),
}

/// Set once any attempt of an operation has sent a commit
#[derive(Debug, Default)]
struct CommitSent(AtomicBool);

impl CommitSent {
    fn mark(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// Whether an earlier commit may have been applied
    fn get(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

struct DeployPlan<'a> {
    package: &'a str,
    track: Track,
    artifact: &'a Artifact,
    sha256: &'a str,
    rollout: RolloutPercentage,
    notes: &'a ReleaseNotes,
}

/// Deploy, promote, halt and roll out releases
#[derive(Clone)]
pub struct ReleaseManager {
    client: ApiClient,
    locks: Arc<KeyedLocks<ReleaseKey>>,
    default_language: String,
}

impl ReleaseManager {
    pub fn new(client: ApiClient, default_language: impl Into<String>) -> Self {
        Self {
            client,
            locks: Arc::new(KeyedLocks::new()),
            default_language: default_language.into(),
        }
    }

    pub fn client(&self) -> &ApiClient {
        &self.client
    }

    /// Upload an artifact and create a release on a track.
    ///
    /// Rollout below 100% creates a staged `inProgress` release; 100% releases
    /// to everyone. Malformed input fails before any network call.
    pub async fn deploy(&self, request: &DeployRequest) -> Result<DeploymentResult> {
        let mut report = validate_package_name(&request.package_name);
        report.merge(validate_track(&request.track));
        report.merge(validate_rollout(request.rollout_percentage));
        let artifact = Artifact::from_path(&request.artifact);
        if let Err(PublishError::Validation(artifact_report)) = &artifact {
            report.merge(artifact_report.clone());
        }
        report.into_result()?;
        let artifact = artifact?;
        let track = parse_track(&request.track)?;
        let rollout = RolloutPercentage::new(request.rollout_percentage)?;
        let notes = request
            .release_notes
            .as_ref()
            .map(|n| n.resolve(&self.default_language))
            .unwrap_or_default();

        info!(
            package = %request.package_name,
            track = %track,
            artifact = %artifact.path.display(),
            size = artifact.size,
            rollout = rollout.value(),
            "deploying"
        );

        let sha256 = fingerprint(&artifact.path).await?;
        let plan = DeployPlan {
            package: &request.package_name,
            track,
            artifact: &artifact,
            sha256: &sha256,
            rollout,
            notes: &notes,
        };

        let session = self.client.session();
        let sent = CommitSent::default();
        let result = session
            .retrying("deploy", |_| self.deploy_attempt(&session, &plan, &sent))
            .await?;

        info!(
            package = %result.package_name,
            track = %result.track,
            version_code = result.version_code,
            status = %result.status,
            "deploy complete"
        );
        Ok(result)
    }

    async fn deploy_attempt(
        &self,
        session: &ApiSession,
        plan: &DeployPlan<'_>,
        sent: &CommitSent,
    ) -> Result<DeploymentResult> {
        let _guard = self
            .locks
            .lock((plan.package.to_string(), plan.track))
            .await;
        let edit = session.insert_edit(plan.package).await?;

        let staged = self.stage_deploy(session, &edit.id, plan, sent).await;
        let release = finish_edit(session, plan.package, &edit.id, staged, sent).await?;

        let version_code = release.version_codes.first().copied().unwrap_or_default();
        Ok(deployment(
            plan.package,
            plan.track,
            version_code,
            &release,
            edit.id,
            format!(
                "Successfully deployed version {} to {}",
                version_code, plan.track
            ),
        ))
    }

    async fn stage_deploy(
        &self,
        session: &ApiSession,
        edit_id: &str,
        plan: &DeployPlan<'_>,
        sent: &CommitSent,
    ) -> Result<Staged> {
        let version_code = self
            .upload_once(session, plan.package, edit_id, plan.artifact, plan.sha256)
            .await?;
        let target = TrackRelease::staged(vec![version_code], plan.rollout, plan.notes.clone());

        if sent.get() {
            let current = session.get_track(plan.package, edit_id, plan.track).await?;
            if let Some(existing) = current.find(version_code) {
                if existing.matches_rollout(&target) {
                    debug!(version_code, "release already present, skipping write");
                    return Ok(Staged::Unchanged(existing.clone()));
                }
            }
        }

        let state = TrackState::new(plan.track, vec![target.clone()]);
        let stored = session.update_track(plan.package, edit_id, &state).await?;
        Ok(Staged::Write(read_back(&stored, version_code, target)))
    }

    /// Reuse a binary the service already holds, otherwise upload it
    async fn upload_once(
        &self,
        session: &ApiSession,
        package: &str,
        edit_id: &str,
        artifact: &Artifact,
        sha256: &str,
    ) -> Result<i64> {
        let existing = session.list_uploads(package, edit_id, artifact.kind).await?;
        if let Some(binary) = existing
            .iter()
            .find(|b| b.sha256.as_deref().is_some_and(|s| s.eq_ignore_ascii_case(sha256)))
        {
            debug!(
                version_code = binary.version_code,
                "artifact already uploaded, reusing version code"
            );
            return Ok(binary.version_code);
        }

        let uploaded = session.upload(package, edit_id, artifact).await?;
        info!(version_code = uploaded.version_code, "upload complete");
        Ok(uploaded.version_code)
    }

    /// Release an existing version of `from_track` on `to_track`.
    ///
    /// The source track is read, never written.
    pub async fn promote(&self, request: &PromoteRequest) -> Result<DeploymentResult> {
        let mut report = validate_package_name(&request.package_name);
        report.merge(validate_track(&request.from_track));
        report.merge(validate_track(&request.to_track));
        report.merge(validate_rollout(request.rollout_percentage));
        report.into_result()?;
        let from = parse_track(&request.from_track)?;
        let to = parse_track(&request.to_track)?;
        let rollout = RolloutPercentage::new(request.rollout_percentage)?;

        info!(
            package = %request.package_name,
            from = %from,
            to = %to,
            version_code = request.version_code,
            rollout = rollout.value(),
            "promoting"
        );

        let session = self.client.session();
        let sent = CommitSent::default();
        session
            .retrying("promote", |_| {
                self.promote_attempt(&session, request, from, to, rollout, &sent)
            })
            .await
    }

    async fn promote_attempt(
        &self,
        session: &ApiSession,
        request: &PromoteRequest,
        from: Track,
        to: Track,
        rollout: RolloutPercentage,
        sent: &CommitSent,
    ) -> Result<DeploymentResult> {
        let package = request.package_name.as_str();
        let version_code = request.version_code;
        let _guard = self.locks.lock((package.to_string(), to)).await;
        let edit = session.insert_edit(package).await?;

        let staged = self
            .stage_promote(session, &edit.id, request, from, to, rollout, sent)
            .await;
        let release = finish_edit(session, package, &edit.id, staged, sent).await?;
        Ok(deployment(
            package,
            to,
            version_code,
            &release,
            edit.id,
            format!(
                "Successfully promoted version {} from {} to {}",
                version_code, from, to
            ),
        ))
    }

    /// Stop a staged rollout. Only valid while the release is in progress.
    pub async fn halt(
        &self,
        package_name: &str,
        track: &str,
        version_code: i64,
    ) -> Result<DeploymentResult> {
        let mut report = validate_package_name(package_name);
        report.merge(validate_track(track));
        report.into_result()?;
        let track = parse_track(track)?;

        info!(package = package_name, track = %track, version_code, "halting release");

        let session = self.client.session();
        let sent = CommitSent::default();
        session
            .retrying("halt", |_| {
                self.halt_attempt(&session, package_name, track, version_code, &sent)
            })
            .await
    }

    async fn halt_attempt(
        &self,
        session: &ApiSession,
        package: &str,
        track: Track,
        version_code: i64,
        sent: &CommitSent,
    ) -> Result<DeploymentResult> {
        let _guard = self.locks.lock((package.to_string(), track)).await;
        let edit = session.insert_edit(package).await?;

        let staged = self
            .stage_halt(session, package, &edit.id, track, version_code, sent)
            .await;
        let release = finish_edit(session, package, &edit.id, staged, sent).await?;
        Ok(deployment(
            package,
            track,
            version_code,
            &release,
            edit.id,
            format!("Successfully halted version {} on {}", version_code, track),
        ))
    }

    /// Change the rollout percentage of an in-progress release.
    ///
    /// 100% is the normal way to finish a rollout; the resulting status is
    /// whatever the service reports back.
    pub async fn update_rollout(
        &self,
        package_name: &str,
        track: &str,
        version_code: i64,
        rollout_percentage: f64,
    ) -> Result<DeploymentResult> {
        let mut report = validate_package_name(package_name);
        report.merge(validate_track(track));
        report.merge(validate_rollout(rollout_percentage));
        report.into_result()?;
        let track = parse_track(track)?;
        let rollout = RolloutPercentage::new(rollout_percentage)?;

        info!(
            package = package_name,
            track = %track,
            version_code,
            rollout = rollout.value(),
            "updating rollout"
        );

        let session = self.client.session();
        let sent = CommitSent::default();
        session
            .retrying("update_rollout", |_| {
                self.rollout_attempt(&session, package_name, track, version_code, rollout, &sent)
            })
            .await
    }

    async fn rollout_attempt(
        &self,
        session: &ApiSession,
        package: &str,
        track: Track,
        version_code: i64,
        rollout: RolloutPercentage,
        sent: &CommitSent,
    ) -> Result<DeploymentResult> {
        let _guard = self.locks.lock((package.to_string(), track)).await;
        let edit = session.insert_edit(package).await?;

        let staged = self
            .stage_rollout(session, package, &edit.id, track, version_code, rollout, sent)
            .await;
        let release = finish_edit(session, package, &edit.id, staged, sent).await?;
        Ok(deployment(
            package,
            track,
            version_code,
            &release,
            edit.id,
            format!(
                "Successfully updated rollout to {}% for version {}",
                rollout.value(),
                version_code
            ),
        ))
    }

    #[allow(clippy::too_many_arguments)]
    async fn stage_promote(
        &self,
        session: &ApiSession,
        edit_id: &str,
        request: &PromoteRequest,
        from: Track,
        to: Track,
        rollout: RolloutPercentage,
        sent: &CommitSent,
    ) -> Result<Staged> {
        let package = request.package_name.as_str();
        let version_code = request.version_code;

        let source = session.get_track(package, edit_id, from).await?;
        let Some(release) = source.find(version_code) else {
            return Err(PublishError::not_found(format!(
                "Version {} not found in {}",
                version_code, from
            )));
        };
        let target = TrackRelease::staged(vec![version_code], rollout, release.release_notes.clone());

        if sent.get() {
            let current = session.get_track(package, edit_id, to).await?;
            if let Some(existing) = current.find(version_code) {
                if existing.matches_rollout(&target) {
                    return Ok(Staged::Unchanged(existing.clone()));
                }
            }
        }

        let state = TrackState::new(to, vec![target.clone()]);
        let stored = session.update_track(package, edit_id, &state).await?;
        Ok(Staged::Write(read_back(&stored, version_code, target)))
    }

    async fn stage_halt(
        &self,
        session: &ApiSession,
        package: &str,
        edit_id: &str,
        track: Track,
        version_code: i64,
        sent: &CommitSent,
    ) -> Result<Staged> {
        let mut state = session.get_track(package, edit_id, track).await?;
        let index = locate(&state, version_code)?;
        let release = &mut state.releases[index];

        if sent.get() && release.status == ReleaseStatus::Halted {
            return Ok(Staged::Unchanged(release.clone()));
        }
        if !release.status.is_in_progress() {
            return Err(PublishError::InvalidState {
                operation: "halt",
                version_code,
                status: release.status,
            });
        }

        release.status = ReleaseStatus::Halted;
        let target = release.clone();
        let stored = session.update_track(package, edit_id, &state).await?;
        Ok(Staged::Write(read_back(&stored, version_code, target)))
    }

    #[allow(clippy::too_many_arguments)]
    async fn stage_rollout(
        &self,
        session: &ApiSession,
        package: &str,
        edit_id: &str,
        track: Track,
        version_code: i64,
        rollout: RolloutPercentage,
        sent: &CommitSent,
    ) -> Result<Staged> {
        let mut state = session.get_track(package, edit_id, track).await?;
        let index = locate(&state, version_code)?;
        let release = &mut state.releases[index];

        let mut target = release.clone();
        target.set_rollout(rollout);
        if sent.get() && release.matches_rollout(&target) {
            return Ok(Staged::Unchanged(release.clone()));
        }
        if !release.status.is_in_progress() {
            return Err(PublishError::InvalidState {
                operation: "update rollout",
                version_code,
                status: release.status,
            });
        }

        *release = target.clone();
        let stored = session.update_track(package, edit_id, &state).await?;
        Ok(Staged::Write(read_back(&stored, version_code, target)))
    }

    /// Releases of every track.
    ///
    /// A failed read of one track is reported on that track only.
    pub async fn get_releases(&self, package_name: &str) -> Result<Vec<TrackReleases>> {
        validate_package_name(package_name).into_result()?;
        debug!(package = package_name, "fetching releases");

        let session = self.client.session();
        let edit = match session
            .retrying("insert_edit", |_| session.insert_edit(package_name))
            .await
        {
            Ok(edit) => edit,
            Err(e) => {
                warn!(package = package_name, error = %e, "could not open edit for reading");
                return Ok(Track::ALL
                    .iter()
                    .map(|track| TrackReleases::failed(*track, &e))
                    .collect());
            }
        };

        let read = |track: Track| {
            let session = &session;
            let edit_id = edit.id.as_str();
            async move {
                let result = session
                    .retrying("get_track", |_| session.get_track(package_name, edit_id, track))
                    .await;
                match result {
                    Ok(state) => TrackReleases::ok(track, state.to_releases(package_name)),
                    Err(e) => {
                        warn!(package = package_name, track = %track, error = %e, "track read failed");
                        TrackReleases::failed(track, &e)
                    }
                }
            }
        };

        let (internal, alpha, beta, production) = tokio::join!(
            read(Track::Internal),
            read(Track::Alpha),
            read(Track::Beta),
            read(Track::Production)
        );

        session.discard_edit(package_name, &edit.id).await;
        Ok(vec![internal, alpha, beta, production])
    }

    /// Deploy one artifact to each requested track.
    ///
    /// Tracks run one after another in request order so later tracks reuse
    /// the version code the first upload produced. A failed track never
    /// stops the others and nothing is rolled back.
    pub async fn batch_deploy(&self, request: &BatchDeployRequest) -> Result<BatchDeploymentResult> {
        if request.tracks.is_empty() {
            let mut report = ValidationReport::new();
            report.add(ValidationIssue::new(
                "tracks",
                "At least one track is required",
                "[]",
            ));
            return Err(PublishError::Validation(report));
        }

        info!(
            package = %request.package_name,
            tracks = ?request.tracks,
            "batch deploying"
        );

        let mut outcomes = Vec::with_capacity(request.tracks.len());
        for track in &request.tracks {
            let deploy = DeployRequest {
                package_name: request.package_name.clone(),
                track: track.clone(),
                artifact: request.artifact.clone(),
                release_notes: request.release_notes.clone(),
                rollout_percentage: request.rollout_for(track),
            };

            let result = self.deploy(&deploy).await;
            if let Err(e) = &result {
                warn!(track = %track, error = %e, "batch track failed");
            }
            outcomes.push(TrackOutcome {
                track: track.clone(),
                result,
            });
        }

        let batch = BatchDeploymentResult::from_outcomes(request.package_name.clone(), outcomes);
        info!(
            package = %batch.package_name,
            successful = batch.successful_count,
            failed = batch.failed_count,
            "{}",
            batch.message()
        );
        Ok(batch)
    }

    /// Google Groups allowed to test a track; none configured reads as empty
    pub async fn get_testers(&self, package_name: &str, track: &str) -> Result<Testers> {
        let mut report = validate_package_name(package_name);
        report.merge(validate_track(track));
        report.into_result()?;
        let track = parse_track(track)?;

        let session = &self.client.session();
        session
            .retrying("get_testers", |_| async move {
                let edit = session.insert_edit(package_name).await?;
                let testers = session
                    .get_testers(package_name, &edit.id, track)
                    .await
                    .or_else(|e| match e {
                        PublishError::NotFound { .. } => Ok(Testers {
                            track,
                            google_groups: Vec::new(),
                        }),
                        e => Err(e),
                    });
                session.discard_edit(package_name, &edit.id).await;
                testers
            })
            .await
    }

    /// Replace the tester groups of a track
    pub async fn update_testers(
        &self,
        package_name: &str,
        track: &str,
        google_groups: Vec<String>,
    ) -> Result<TestersUpdate> {
        let mut report = validate_package_name(package_name);
        report.merge(validate_track(track));
        report.merge(validate_tester_groups(&google_groups));
        report.into_result()?;
        let track = parse_track(track)?;
        let testers = Testers {
            track,
            google_groups,
        };

        info!(
            package = package_name,
            track = %track,
            groups = testers.google_groups.len(),
            "updating testers"
        );

        let session = self.client.session();
        let sent = CommitSent::default();
        let stored = session
            .retrying("update_testers", |_| {
                self.testers_attempt(&session, package_name, &testers, &sent)
            })
            .await?;

        Ok(TestersUpdate {
            message: format!(
                "Successfully updated {} testers for {}",
                stored.google_groups.len(),
                track
            ),
            testers: stored,
        })
    }

    async fn testers_attempt(
        &self,
        session: &ApiSession,
        package: &str,
        testers: &Testers,
        sent: &CommitSent,
    ) -> Result<Testers> {
        let _guard = self.locks.lock((package.to_string(), testers.track)).await;
        let edit = session.insert_edit(package).await?;
        let staged = session
            .update_testers(package, &edit.id, testers)
            .await
            .map(Staged::Write);
        finish_edit(session, package, &edit.id, staged, sent).await
    }

    /// Expansion file of an APK version; a version without one reads as empty
    pub async fn get_expansion_file(
        &self,
        package_name: &str,
        version_code: i64,
        file_type: ExpansionFileType,
    ) -> Result<ExpansionFile> {
        validate_package_name(package_name).into_result()?;

        let session = &self.client.session();
        session
            .retrying("get_expansion_file", |_| async move {
                let edit = session.insert_edit(package_name).await?;
                let file = session
                    .get_expansion_file(package_name, &edit.id, version_code, file_type)
                    .await
                    .or_else(|e| match e {
                        PublishError::NotFound { .. } => Ok(ExpansionFile {
                            version_code,
                            file_type,
                            file_size: None,
                            references_version: None,
                        }),
                        e => Err(e),
                    });
                session.discard_edit(package_name, &edit.id).await;
                file
            })
            .await
    }
}

/// Outcome of a tester update
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TestersUpdate {
    #[serde(flatten)]
    pub testers: Testers,
    pub message: String,
}

/// Commit written changes or discard the edit; any failure discards it
async fn finish_edit<T>(
    session: &ApiSession,
    package: &str,
    edit_id: &str,
    staged: Result<Staged<T>>,
    sent: &CommitSent,
) -> Result<T> {
    match staged {
        Ok(Staged::Write(release)) => {
            sent.mark();
            match session.commit_edit(package, edit_id).await {
                Ok(()) => Ok(release),
                Err(e) => {
                    session.discard_edit(package, edit_id).await;
                    Err(e)
                }
            }
        }
        Ok(Staged::Unchanged(release)) => {
            session.discard_edit(package, edit_id).await;
            Ok(release)
        }
        Err(e) => {
            session.discard_edit(package, edit_id).await;
            Err(e)
        }
    }
}

fn parse_track(track: &str) -> Result<Track> {
    track
        .parse()
        .map_err(|_| PublishError::Validation(validate_track(track)))
}

fn locate(state: &TrackState, version_code: i64) -> Result<usize> {
    state.position(version_code).ok_or_else(|| {
        PublishError::not_found(format!(
            "Version {} not found in {}",
            version_code, state.track
        ))
    })
}

/// The stored release for `version_code`, falling back to what was sent
fn read_back(stored: &TrackState, version_code: i64, sent: TrackRelease) -> TrackRelease {
    stored.find(version_code).cloned().unwrap_or(sent)
}

fn deployment(
    package: &str,
    track: Track,
    version_code: i64,
    release: &TrackRelease,
    edit_id: String,
    message: String,
) -> DeploymentResult {
    DeploymentResult {
        package_name: package.to_string(),
        track,
        version_code,
        status: release.status,
        rollout_percentage: release.rollout_percentage(),
        edit_id: Some(edit_id),
        message,
    }
}

/// Lowercase hex SHA-256 of a file
async fn fingerprint(path: &Path) -> Result<String> {
    let bytes = tokio::fs::read(path).await?;
    Ok(hex::encode(Sha256::digest(&bytes)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credentials::{test_credential, CredentialStore};
    use crate::retry::RetryPolicy;
    use crate::testing::{ApiOp, Failure, ScriptedApi};
    use playdeck_core::{ErrorClass, ErrorKind};
    use std::time::Duration;
    use tempfile::TempDir;

    const PKG: &str = "com.example.app";

    struct Fixture {
        api: Arc<ScriptedApi>,
        store: Arc<CredentialStore>,
        manager: ReleaseManager,
        _dir: TempDir,
        artifact: PathBuf,
    }

    fn fixture(api: ScriptedApi) -> Fixture {
        let api = Arc::new(api);
        let store = Arc::new(CredentialStore::new(
            test_credential("ci@example.iam.gserviceaccount.com"),
            api.clone(),
        ));
        let client = ApiClient::new(api.clone(), store.clone(), RetryPolicy::default());
        let dir = TempDir::new().unwrap();
        let artifact = dir.path().join("app-release.aab");
        std::fs::write(&artifact, b"bundle bytes").unwrap();
        Fixture {
            api,
            store,
            manager: ReleaseManager::new(client, "en-US"),
            _dir: dir,
            artifact,
        }
    }

    fn staged(version_code: i64, percentage: f64) -> TrackRelease {
        TrackRelease::staged(
            vec![version_code],
            RolloutPercentage::new(percentage).unwrap(),
            ReleaseNotes::single("en-US", "Initial"),
        )
    }

    fn with_status(version_code: i64, status: ReleaseStatus) -> TrackRelease {
        let mut release = staged(version_code, 100.0);
        release.status = status;
        release
    }

    fn deploy_request(f: &Fixture, track: &str, rollout: f64) -> DeployRequest {
        DeployRequest {
            package_name: PKG.to_string(),
            track: track.to_string(),
            artifact: f.artifact.clone(),
            release_notes: Some(ReleaseNotesInput::Text("Bug fixes".to_string())),
            rollout_percentage: rollout,
        }
    }

    #[tokio::test]
    async fn test_deploy_staged_rollout() {
        let f = fixture(ScriptedApi::new().with_next_version_code(42));
        let result = f.manager.deploy(&deploy_request(&f, "beta", 20.0)).await.unwrap();

        assert_eq!(result.version_code, 42);
        assert_eq!(result.track, Track::Beta);
        assert_eq!(result.status, ReleaseStatus::InProgress);
        assert!((result.rollout_percentage - 20.0).abs() < 1e-9);
        assert_eq!(result.message, "Successfully deployed version 42 to beta");

        let track = f.api.track(PKG, Track::Beta);
        assert_eq!(track.len(), 1);
        assert_eq!(track[0].user_fraction, Some(0.2));
        assert_eq!(track[0].release_notes.get("en-US"), Some("Bug fixes"));
        assert_eq!(f.api.open_edits(), 0);
    }

    #[tokio::test]
    async fn test_deploy_full_rollout_reads_back_completed() {
        let f = fixture(ScriptedApi::new());
        let result = f.manager.deploy(&deploy_request(&f, "internal", 100.0)).await.unwrap();
        assert_eq!(result.status, ReleaseStatus::Completed);
        assert_eq!(result.rollout_percentage, 100.0);
        assert_eq!(f.api.track(PKG, Track::Internal)[0].user_fraction, None);
    }

    #[tokio::test]
    async fn test_deploy_validation_makes_no_calls() {
        let f = fixture(ScriptedApi::new());
        let mut request = deploy_request(&f, "staging", 150.0);
        request.package_name = "Com.example".to_string();
        request.artifact = PathBuf::from("/nonexistent/app.aab");

        let err = f.manager.deploy(&request).await.unwrap_err();
        let report = err.validation_report().unwrap();
        let fields: Vec<&str> = report.iter().map(|i| i.field.as_str()).collect();
        assert!(fields.contains(&"package_name"));
        assert!(fields.contains(&"track"));
        assert!(fields.contains(&"rollout_percentage"));
        assert!(fields.contains(&"file_path"));
        assert!(f.api.calls().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_deploy_retry_does_not_duplicate_upload() {
        let f = fixture(ScriptedApi::new().with_next_version_code(7));
        // The commit lands but its response is lost
        f.api.fail(ApiOp::CommitEdit, [Failure::AfterApply(503)]);

        let result = f.manager.deploy(&deploy_request(&f, "alpha", 50.0)).await.unwrap();

        assert_eq!(result.version_code, 7);
        assert_eq!(f.api.count(ApiOp::Upload), 1);
        assert_eq!(f.api.count(ApiOp::UpdateTrack), 1);
        assert_eq!(f.api.binaries(PKG).len(), 1);
        assert_eq!(f.api.open_edits(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_deploy_retry_after_failed_write() {
        let f = fixture(ScriptedApi::new());
        f.api.fail_track(Track::Production, [Failure::Status(500)]);

        let result = f
            .manager
            .deploy(&deploy_request(&f, "production", 5.0))
            .await
            .unwrap();

        assert_eq!(result.status, ReleaseStatus::InProgress);
        assert_eq!(f.api.count(ApiOp::InsertEdit), 2);
        assert_eq!(f.api.count(ApiOp::DeleteEdit), 1);
        assert_eq!(f.api.count(ApiOp::CommitEdit), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_backoff_releases_key_lock() {
        let f = fixture(ScriptedApi::new());
        f.api.fail(ApiOp::UpdateTrack, [Failure::Status(503)]);

        let manager = f.manager.clone();
        let request = deploy_request(&f, "beta", 10.0);
        let task = tokio::spawn(async move { manager.deploy(&request).await });

        // First attempt fails quickly; the retry waits at least one second
        tokio::time::sleep(Duration::from_millis(500)).await;
        assert_eq!(f.manager.locks.active(), 0);

        task.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_promote_copies_notes_and_keeps_source() {
        let f = fixture(ScriptedApi::new().with_track(PKG, Track::Beta, vec![staged(42, 100.0)]));
        let request = PromoteRequest {
            package_name: PKG.to_string(),
            from_track: "beta".to_string(),
            to_track: "production".to_string(),
            version_code: 42,
            rollout_percentage: 20.0,
        };

        let result = f.manager.promote(&request).await.unwrap();
        assert_eq!(result.track, Track::Production);
        assert_eq!(result.status, ReleaseStatus::InProgress);
        assert_eq!(
            result.message,
            "Successfully promoted version 42 from beta to production"
        );

        let production = f.api.track(PKG, Track::Production);
        assert_eq!(production[0].release_notes.get("en-US"), Some("Initial"));
        assert_eq!(f.api.track(PKG, Track::Beta), vec![staged(42, 100.0)]);
    }

    #[tokio::test]
    async fn test_promote_missing_version_writes_nothing() {
        let f = fixture(ScriptedApi::new().with_track(PKG, Track::Beta, vec![staged(41, 100.0)]));
        let request = PromoteRequest {
            package_name: PKG.to_string(),
            from_track: "beta".to_string(),
            to_track: "production".to_string(),
            version_code: 42,
            rollout_percentage: 20.0,
        };

        let err = f.manager.promote(&request).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert_eq!(err.to_string(), "Not found: Version 42 not found in beta");
        assert_eq!(f.api.count(ApiOp::UpdateTrack), 0);
        assert_eq!(f.api.count(ApiOp::CommitEdit), 0);
        assert!(f.api.track(PKG, Track::Production).is_empty());
        assert_eq!(f.api.open_edits(), 0);
    }

    #[tokio::test]
    async fn test_halt_in_progress() {
        let f = fixture(ScriptedApi::new().with_track(PKG, Track::Production, vec![staged(42, 20.0)]));
        let result = f.manager.halt(PKG, "production", 42).await.unwrap();

        assert_eq!(result.status, ReleaseStatus::Halted);
        assert_eq!(f.api.track(PKG, Track::Production)[0].status, ReleaseStatus::Halted);
        assert_eq!(f.api.track(PKG, Track::Production)[0].user_fraction, Some(0.2));
    }

    #[tokio::test]
    async fn test_halt_from_terminal_state_is_invalid() {
        for status in [ReleaseStatus::Completed, ReleaseStatus::Halted] {
            let f = fixture(
                ScriptedApi::new().with_track(PKG, Track::Production, vec![with_status(42, status)]),
            );
            let err = f.manager.halt(PKG, "production", 42).await.unwrap_err();

            assert!(matches!(
                err,
                PublishError::InvalidState { operation: "halt", version_code: 42, status: s } if s == status
            ));
            assert_eq!(f.api.count(ApiOp::UpdateTrack), 0);
            assert_eq!(f.api.track(PKG, Track::Production)[0].status, status);
        }
    }

    #[tokio::test]
    async fn test_halt_missing_version() {
        let f = fixture(ScriptedApi::new());
        let err = f.manager.halt(PKG, "beta", 9).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn test_update_rollout_range() {
        let f = fixture(ScriptedApi::new().with_track(PKG, Track::Beta, vec![staged(42, 10.0)]));

        for bad in [-0.1, 100.5, f64::NAN] {
            let err = f.manager.update_rollout(PKG, "beta", 42, bad).await.unwrap_err();
            assert_eq!(err.kind(), ErrorKind::Validation);
        }
        assert!(f.api.calls().is_empty());

        let lowered = f.manager.update_rollout(PKG, "beta", 42, 5.0).await.unwrap();
        assert!((lowered.rollout_percentage - 5.0).abs() < 1e-9);
        assert_eq!(lowered.status, ReleaseStatus::InProgress);

        let full = f.manager.update_rollout(PKG, "beta", 42, 100.0).await.unwrap();
        assert_eq!(full.status, ReleaseStatus::Completed);
        assert_eq!(f.api.track(PKG, Track::Beta)[0].user_fraction, None);

        let err = f.manager.update_rollout(PKG, "beta", 42, 50.0).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidState);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retried_halt_after_lost_commit() {
        let f = fixture(ScriptedApi::new().with_track(PKG, Track::Production, vec![staged(42, 20.0)]));
        f.api.fail(ApiOp::CommitEdit, [Failure::AfterApply(500)]);

        let result = f.manager.halt(PKG, "production", 42).await.unwrap();
        assert_eq!(result.status, ReleaseStatus::Halted);
        assert_eq!(f.api.count(ApiOp::UpdateTrack), 1);
    }

    #[tokio::test]
    async fn test_get_releases_partial_failure() {
        let f = fixture(
            ScriptedApi::new()
                .with_track(PKG, Track::Internal, vec![staged(40, 100.0)])
                .with_track(PKG, Track::Production, vec![staged(38, 50.0)]),
        );
        f.api.fail_track(Track::Alpha, [Failure::Status(403)]);

        let tracks = f.manager.get_releases(PKG).await.unwrap();
        let order: Vec<Track> = tracks.iter().map(|t| t.track).collect();
        assert_eq!(order, Track::ALL.to_vec());

        assert_eq!(tracks[0].releases[0].version_codes, vec![40]);
        assert!(tracks[0].error.is_none());
        let alpha_error = tracks[1].error.as_ref().unwrap();
        assert_eq!(alpha_error.kind, ErrorKind::Auth);
        assert_eq!(alpha_error.status, Some(403));
        assert!(tracks[2].releases.is_empty() && tracks[2].error.is_none());
        assert!((tracks[3].releases[0].rollout_percentage - 50.0).abs() < 1e-9);
        assert_eq!(f.api.open_edits(), 0);
        assert_eq!(f.api.count(ApiOp::UpdateTrack), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_batch_deploy_isolates_failures() {
        let f = fixture(ScriptedApi::new().with_next_version_code(300));
        f.api.fail_track(Track::Alpha, [Failure::Status(500); 4]);

        let request = BatchDeployRequest {
            package_name: PKG.to_string(),
            artifact: f.artifact.clone(),
            tracks: vec!["internal".to_string(), "alpha".to_string()],
            release_notes: None,
            rollout_percentage: 100.0,
            track_rollouts: BTreeMap::new(),
        };

        let batch = f.manager.batch_deploy(&request).await.unwrap();
        assert_eq!(batch.successful_count, 1);
        assert_eq!(batch.failed_count, 1);
        assert!(batch.outcome("internal").unwrap().is_success());

        let alpha = batch.outcome("alpha").unwrap().error().unwrap();
        assert!(matches!(alpha, PublishError::RetriesExhausted { attempts: 4, .. }));
        assert_eq!(alpha.class(), Some(ErrorClass::ServerError));
        assert_eq!(batch.message(), "Deployed to 1/2 tracks successfully (1 failed)");

        // internal stays deployed; the artifact was uploaded once
        assert_eq!(f.api.track(PKG, Track::Internal)[0].version_codes, vec![300]);
        assert_eq!(f.api.count(ApiOp::Upload), 1);
    }

    #[tokio::test]
    async fn test_batch_reuses_upload_and_per_track_rollout() {
        let f = fixture(ScriptedApi::new());
        let request = BatchDeployRequest {
            package_name: PKG.to_string(),
            artifact: f.artifact.clone(),
            tracks: vec!["internal".to_string(), "production".to_string(), "qa".to_string()],
            release_notes: None,
            rollout_percentage: 100.0,
            track_rollouts: BTreeMap::from([("production".to_string(), 10.0)]),
        };

        let batch = f.manager.batch_deploy(&request).await.unwrap();
        assert_eq!(batch.successful_count, 2);
        assert_eq!(batch.outcome("qa").unwrap().error().unwrap().kind(), ErrorKind::Validation);

        let production = batch.outcome("production").unwrap().result.as_ref().unwrap();
        assert_eq!(production.status, ReleaseStatus::InProgress);
        assert_eq!(f.api.count(ApiOp::Upload), 1);
    }

    #[tokio::test]
    async fn test_batch_requires_tracks() {
        let f = fixture(ScriptedApi::new());
        let request = BatchDeployRequest {
            package_name: PKG.to_string(),
            artifact: f.artifact.clone(),
            tracks: Vec::new(),
            release_notes: None,
            rollout_percentage: 100.0,
            track_rollouts: BTreeMap::new(),
        };
        let err = f.manager.batch_deploy(&request).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
    }

    #[tokio::test]
    async fn test_same_key_operations_are_serialized() {
        let f = fixture(ScriptedApi::new().with_track(PKG, Track::Production, vec![staged(42, 20.0)]));
        let hold = f.api.hold(ApiOp::GetTrack);

        let halting = {
            let manager = f.manager.clone();
            tokio::spawn(async move { manager.halt(PKG, "production", 42).await })
        };
        hold.arrived(1).await;

        let rolling = {
            let manager = f.manager.clone();
            tokio::spawn(async move { manager.update_rollout(PKG, "production", 42, 50.0).await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        // The rollout update is waiting for the key, not talking to the service
        assert_eq!(f.api.count(ApiOp::InsertEdit), 1);

        hold.release();
        assert_eq!(halting.await.unwrap().unwrap().status, ReleaseStatus::Halted);
        let err = rolling.await.unwrap().unwrap_err();
        assert!(matches!(
            err,
            PublishError::InvalidState { status: ReleaseStatus::Halted, .. }
        ));
    }

    #[tokio::test]
    async fn test_different_keys_run_in_parallel() {
        let f = fixture(
            ScriptedApi::new()
                .with_track(PKG, Track::Production, vec![staged(42, 20.0)])
                .with_track(PKG, Track::Beta, vec![staged(43, 20.0)]),
        );
        let hold = f.api.hold(ApiOp::GetTrack);

        let halting = {
            let manager = f.manager.clone();
            tokio::spawn(async move { manager.halt(PKG, "production", 42).await })
        };
        hold.arrived(1).await;

        // beta proceeds while production is held mid-operation
        let beta = f.manager.update_rollout(PKG, "beta", 43, 60.0).await.unwrap();
        assert!((beta.rollout_percentage - 60.0).abs() < 1e-9);

        hold.release();
        halting.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_swap_during_operations_on_several_keys() {
        const OLD: &str = "ci@example.iam.gserviceaccount.com";
        const NEW: &str = "rotated@example.iam.gserviceaccount.com";
        let f = fixture(
            ScriptedApi::new()
                .with_track(PKG, Track::Production, vec![staged(42, 20.0)])
                .with_track(PKG, Track::Beta, vec![staged(43, 20.0)])
                .with_track(PKG, Track::Alpha, vec![staged(44, 20.0)])
                .with_track(PKG, Track::Internal, vec![staged(45, 20.0)]),
        );
        let hold = f.api.hold_calls(ApiOp::GetTrack, 3);

        let halting = {
            let manager = f.manager.clone();
            tokio::spawn(async move { manager.halt(PKG, "production", 42).await })
        };
        let beta = {
            let manager = f.manager.clone();
            tokio::spawn(async move { manager.update_rollout(PKG, "beta", 43, 30.0).await })
        };
        let alpha = {
            let manager = f.manager.clone();
            tokio::spawn(async move { manager.update_rollout(PKG, "alpha", 44, 40.0).await })
        };
        hold.arrived(3).await;

        f.store.swap(test_credential(NEW)).await.unwrap();
        // started after the swap, so it runs under the new identity
        f.manager
            .update_rollout(PKG, "internal", 45, 50.0)
            .await
            .unwrap();

        hold.release();
        assert_eq!(halting.await.unwrap().unwrap().status, ReleaseStatus::Halted);
        beta.await.unwrap().unwrap();
        alpha.await.unwrap().unwrap();

        let calls: Vec<_> = f
            .api
            .calls()
            .into_iter()
            .filter(|c| c.op != ApiOp::Probe)
            .collect();
        for track in [Track::Production, Track::Beta, Track::Alpha] {
            let on_track: Vec<_> = calls.iter().filter(|c| c.track == Some(track)).collect();
            // read and write of each held operation
            assert_eq!(on_track.len(), 2, "{track}");
            assert!(on_track.iter().all(|c| c.client_email == OLD), "{track}");
        }
        assert!(calls
            .iter()
            .filter(|c| c.track == Some(Track::Internal))
            .all(|c| c.client_email == NEW));

        // open, read, write, commit for each operation
        let old = calls.iter().filter(|c| c.client_email == OLD).count();
        let new = calls.iter().filter(|c| c.client_email == NEW).count();
        assert_eq!(old, 12);
        assert_eq!(new, 4);
        assert_eq!(f.api.track(PKG, Track::Production)[0].status, ReleaseStatus::Halted);
        assert_eq!(f.api.track(PKG, Track::Alpha)[0].user_fraction, Some(0.4));
    }

    #[tokio::test(start_paused = true)]
    async fn test_halt_retry_without_commit_checks_state() {
        let f = fixture(ScriptedApi::new().with_track(
            PKG,
            Track::Production,
            vec![with_status(42, ReleaseStatus::Halted)],
        ));
        f.api.fail(ApiOp::GetTrack, [Failure::Status(503)]);

        let err = f.manager.halt(PKG, "production", 42).await.unwrap_err();
        assert!(matches!(
            err,
            PublishError::InvalidState { operation: "halt", status: ReleaseStatus::Halted, .. }
        ));
        assert_eq!(f.api.count(ApiOp::GetTrack), 2);
        assert_eq!(f.api.count(ApiOp::UpdateTrack), 0);
        assert_eq!(f.api.count(ApiOp::CommitEdit), 0);
        assert_eq!(f.api.open_edits(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_rollout_retry_on_completed_release_is_invalid() {
        let f = fixture(ScriptedApi::new().with_track(
            PKG,
            Track::Production,
            vec![with_status(42, ReleaseStatus::Completed)],
        ));
        f.api.fail(ApiOp::GetTrack, [Failure::Transport]);

        let err = f
            .manager
            .update_rollout(PKG, "production", 42, 100.0)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            PublishError::InvalidState {
                operation: "update rollout",
                status: ReleaseStatus::Completed,
                ..
            }
        ));
        assert_eq!(f.api.count(ApiOp::UpdateTrack), 0);
        assert_eq!(f.api.count(ApiOp::CommitEdit), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_after_refused_commit_writes_again() {
        let f = fixture(ScriptedApi::new().with_track(PKG, Track::Beta, vec![staged(42, 20.0)]));
        // refused before it was applied; the next attempt re-reads and writes
        f.api.fail(ApiOp::CommitEdit, [Failure::Status(503)]);

        let result = f.manager.update_rollout(PKG, "beta", 42, 60.0).await.unwrap();
        assert!((result.rollout_percentage - 60.0).abs() < 1e-9);
        assert_eq!(f.api.count(ApiOp::UpdateTrack), 2);
        assert_eq!(f.api.count(ApiOp::CommitEdit), 2);
        assert_eq!(f.api.track(PKG, Track::Beta)[0].user_fraction, Some(0.6));
    }

    #[tokio::test]
    async fn test_testers_update_and_read() {
        let f = fixture(ScriptedApi::new());

        let empty = f.manager.get_testers(PKG, "alpha").await.unwrap();
        assert!(empty.google_groups.is_empty());

        let groups = vec!["qa-team@googlegroups.com".to_string()];
        let update = f
            .manager
            .update_testers(PKG, "alpha", groups.clone())
            .await
            .unwrap();
        assert_eq!(update.message, "Successfully updated 1 testers for alpha");
        assert_eq!(f.api.testers(PKG, Track::Alpha), Some(groups.clone()));
        assert_eq!(f.api.open_edits(), 0);

        let read = f.manager.get_testers(PKG, "alpha").await.unwrap();
        assert_eq!(read.google_groups, groups);
        assert_eq!(read.track, Track::Alpha);
    }

    #[tokio::test]
    async fn test_testers_validation_makes_no_calls() {
        let f = fixture(ScriptedApi::new());
        let err = f
            .manager
            .update_testers(PKG, "gamma", vec!["not an email".to_string()])
            .await
            .unwrap_err();
        let report = err.validation_report().unwrap();
        let fields: Vec<&str> = report.iter().map(|i| i.field.as_str()).collect();
        assert!(fields.contains(&"track"));
        assert!(fields.contains(&"google_groups"));
        assert!(f.api.calls().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_testers_update_retries() {
        let f = fixture(ScriptedApi::new());
        f.api.fail(ApiOp::UpdateTesters, [Failure::Status(429)]);

        f.manager
            .update_testers(PKG, "beta", vec!["beta@googlegroups.com".to_string()])
            .await
            .unwrap();
        assert_eq!(f.api.count(ApiOp::UpdateTesters), 2);
        assert_eq!(f.api.count(ApiOp::CommitEdit), 1);
        assert_eq!(f.api.open_edits(), 0);
    }

    #[tokio::test]
    async fn test_expansion_file_lookup() {
        let f = fixture(ScriptedApi::new().with_expansion_file(
            PKG,
            ExpansionFile {
                version_code: 42,
                file_type: ExpansionFileType::Main,
                file_size: Some(2048),
                references_version: None,
            },
        ));

        let main = f
            .manager
            .get_expansion_file(PKG, 42, ExpansionFileType::Main)
            .await
            .unwrap();
        assert_eq!(main.file_size, Some(2048));

        let patch = f
            .manager
            .get_expansion_file(PKG, 42, ExpansionFileType::Patch)
            .await
            .unwrap();
        assert_eq!(patch.file_size, None);
        assert_eq!(patch.file_type, ExpansionFileType::Patch);
        assert_eq!(f.api.open_edits(), 0);
    }

    #[test]
    fn test_notes_input_resolution() {
        let text = ReleaseNotesInput::Text("Fixes".to_string());
        assert_eq!(text.resolve("de-DE").get("de-DE"), Some("Fixes"));

        let parsed: ReleaseNotesInput =
            serde_json::from_str(r#"{"en-US": "Fixes", "fr-FR": "Corrections"}"#).unwrap();
        assert_eq!(parsed.resolve("de-DE").len(), 2);

        assert!(ReleaseNotesInput::Text(String::new()).resolve("en-US").is_empty());
    }
}
