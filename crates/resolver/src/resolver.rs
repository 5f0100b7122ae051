//! Configuration filtering

use crate::{ResolveOptions, UpdateResult};
use updkit_events::{AppEvent, EventEmitter, EventSender, ResolverEvent, SkipReason};
use updkit_types::{DevelopmentStage, UpdateConfiguration, UpdateVersion};

/// Filters a configuration document down to the applicable updates
#[derive(Clone, Debug, Default)]
pub struct UpdateConfigurationResolver {
    tx: Option<EventSender>,
}

impl EventEmitter for UpdateConfigurationResolver {
    fn event_sender(&self) -> Option<&EventSender> {
        self.tx.as_ref()
    }
}

impl UpdateConfigurationResolver {
    /// Create a resolver that reports skipped candidates on `tx`
    #[must_use]
    pub fn new(tx: Option<EventSender>) -> Self {
        Self { tx }
    }

    /// Select the configurations that apply to `current`
    ///
    /// Filters run in this order, each preserving input order:
    /// 1. newer than `current`, or marked necessary
    /// 2. stage allowed (release and rc always, alpha/beta on opt-in)
    /// 3. `current`'s basic version is not listed as unsupported
    /// 4. architecture matches the OS bitness
    /// 5. strictly newer than `current`
    /// 6. not below the highest survivor, unless marked necessary
    ///
    /// Step 5 also removes necessary configurations that are not newer, so
    /// the step 1 override never lets an older package through.
    #[must_use]
    pub fn resolve(
        &self,
        configurations: &[UpdateConfiguration],
        current: &UpdateVersion,
        options: &ResolveOptions,
    ) -> UpdateResult {
        let mut survivors: Vec<&UpdateConfiguration> = configurations.iter().collect();

        self.retain(&mut survivors, SkipReason::NotNewer, |c| {
            c.literal_version > *current || c.necessary_update
        });

        self.retain(&mut survivors, SkipReason::PrereleaseNotAllowed, |c| {
            match c.literal_version.stage() {
                DevelopmentStage::Release | DevelopmentStage::ReleaseCandidate => true,
                DevelopmentStage::Alpha => options.allow_alpha,
                DevelopmentStage::Beta => options.allow_beta,
            }
        });

        self.retain(&mut survivors, SkipReason::UnsupportedCurrentVersion, |c| {
            !c.excludes(current)
        });

        self.retain(&mut survivors, SkipReason::Architecture, |c| {
            c.architecture.matches_os(options.os_is_64bit)
        });

        self.retain(&mut survivors, SkipReason::NotNewer, |c| {
            c.literal_version > *current
        });

        if let Some(highest) =
            UpdateVersion::highest(survivors.iter().map(|c| c.literal_version.clone()))
        {
            self.retain(&mut survivors, SkipReason::NotNewer, |c| {
                c.literal_version >= highest || c.necessary_update
            });
        }

        UpdateResult::new(survivors.into_iter().cloned().collect())
    }

    fn retain<F>(&self, survivors: &mut Vec<&UpdateConfiguration>, reason: SkipReason, keep: F)
    where
        F: Fn(&UpdateConfiguration) -> bool,
    {
        survivors.retain(|config| {
            let kept = keep(config);
            if !kept {
                self.emit(AppEvent::Resolver(ResolverEvent::CandidateSkipped {
                    version: config.literal_version.clone(),
                    reason,
                }));
            }
            kept
        });
    }
}

/// Resolve without event reporting
#[must_use]
pub fn resolve(
    configurations: &[UpdateConfiguration],
    current: &UpdateVersion,
    options: &ResolveOptions,
) -> UpdateResult {
    UpdateConfigurationResolver::default().resolve(configurations, current, options)
}
