use std::sync::Arc;

use chirp_fs::fs::Namespace;
use tokio::select;
use tracing::{debug, error, info};

use crate::app_config;
use crate::remote::ChirpRemote;

mod managed_fuse {
    //! fuser only does a regular unmount when the `BackgroundSession` is dropped, which fails
    //! while anything still holds the mount busy. `ManagedFuse` follows up with a forced,
    //! retried unmount so a restart never finds a stale mount point.
    use std::path::PathBuf;
    use std::sync::Arc;
    use std::time::Duration;

    use chirp_fs::fs::Namespace;
    use chirp_fs::fs::fuser::FuserAdapter;
    use fuser::BackgroundSession;
    use nix::errno::Errno;

    use super::{ChirpRemote, app_config, debug, error};

    pub struct FuseCoreScope {
        _session: BackgroundSession,
    }

    pub struct ManagedFuse {
        mount_point: PathBuf,
    }

    impl ManagedFuse {
        pub fn new(config: &app_config::Config) -> Self {
            Self {
                mount_point: config.mount_point.clone(),
            }
        }

        pub fn spawn(
            &self,
            config: &app_config::Config,
            namespace: Arc<Namespace<ChirpRemote>>,
            handle: tokio::runtime::Handle,
        ) -> Result<FuseCoreScope, std::io::Error> {
            let adapter = FuserAdapter::new(namespace, (config.uid, config.gid), handle);
            let mount_opts = [
                fuser::MountOption::FSName("chirp-fs".to_owned()),
                fuser::MountOption::RO,
                fuser::MountOption::NoDev,
                fuser::MountOption::NoExec,
                fuser::MountOption::AutoUnmount,
                fuser::MountOption::DefaultPermissions,
                fuser::MountOption::AllowOther,
            ];

            Ok(FuseCoreScope {
                _session: fuser::spawn_mount2(adapter, &self.mount_point, &mount_opts)?,
            })
        }
    }

    impl Drop for ManagedFuse {
        fn drop(&mut self) {
            const UMOUNT_ATTEMPT_COUNT: usize = 10;
            const UMOUNT_ATTEMPT_DELAY: Duration = Duration::from_millis(10);

            debug!(mount_point = ?self.mount_point, "Confirming unmount of FUSE filesystem...");

            for attempt in 1..=UMOUNT_ATTEMPT_COUNT {
                #[cfg(target_os = "macos")]
                let result = nix::mount::unmount(&self.mount_point, nix::mount::MntFlags::MNT_FORCE);
                #[cfg(not(target_os = "macos"))]
                let result =
                    nix::mount::umount2(&self.mount_point, nix::mount::MntFlags::MNT_DETACH);

                match result {
                    Ok(()) => {
                        debug!(attempt, "Unmounted FUSE filesystem.");
                        break;
                    }
                    Err(Errno::EBUSY) => {
                        debug!(attempt, "FUSE filesystem still busy, retrying.");
                        std::thread::sleep(UMOUNT_ATTEMPT_DELAY);
                    }
                    Err(Errno::EINVAL | Errno::ENOENT) => {
                        debug!(attempt, "FUSE filesystem already unmounted.");
                        break;
                    }
                    Err(e) => {
                        error!(attempt, error = %e, "Failed to unmount FUSE filesystem.");
                        break;
                    }
                }
            }
        }
    }
}

/// Prepares the mount point directory.
///
/// A missing directory is created, an empty one is used as is, and a non-empty one is refused.
async fn prepare_mount_point(mount_point: &std::path::Path) -> Result<(), std::io::Error> {
    match tokio::fs::read_dir(mount_point).await {
        Ok(mut entries) => {
            if entries.next_entry().await?.is_some() {
                return Err(std::io::Error::new(
                    std::io::ErrorKind::AlreadyExists,
                    format!(
                        "Mount point '{}' already exists and is not empty.",
                        mount_point.display()
                    ),
                ));
            }
            Ok(())
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            tokio::fs::create_dir_all(mount_point).await?;
            info!(path = %mount_point.display(), "Created mount point directory.");
            Ok(())
        }
        Err(e) => Err(e),
    }
}

async fn wait_for_exit() -> Result<(), std::io::Error> {
    use tokio::signal;
    let mut sigterm = signal::unix::signal(signal::unix::SignalKind::terminate())?;
    let mut sighup = signal::unix::signal(signal::unix::SignalKind::hangup())?;
    select! {
        _ = signal::ctrl_c() => {
            debug!("Received Ctrl+C signal, shutting down...");
        },
        _ = sigterm.recv() => {
            debug!("Received termination signal, shutting down...");
        },
        _ = sighup.recv() => {
            debug!("Received hangup signal, shutting down...");
        },
    }
    Ok(())
}

fn build_remote(config: &app_config::Config) -> Result<ChirpRemote, std::io::Error> {
    let token = config.user_token.clone().ok_or_else(|| {
        std::io::Error::new(std::io::ErrorKind::InvalidInput, "no user token configured")
    })?;
    let client = openchirp::ClientBuilder::new(config.user_id.clone(), token)
        .base_url(config.api_url.clone())
        .timeout(config.request_timeout())
        .build()
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidInput, e))?;
    Ok(ChirpRemote::new(client))
}

/// Main entry point for the daemon.
pub async fn run(
    config: app_config::Config,
    handle: tokio::runtime::Handle,
) -> Result<(), std::io::Error> {
    prepare_mount_point(&config.mount_point).await?;

    let remote = build_remote(&config)?;
    info!(api = %config.api_url, "Connecting to OpenChirp.");
    // Fetch the root before mounting so bad credentials or an unreachable API fail loudly here.
    let namespace = Namespace::connect(remote, &config.root_location)
        .await
        .inspect_err(|e| error!(error = %e, "Could not fetch the root location."))?;
    info!(
        root = namespace.root().meta().display_name(),
        "Mounting filesystem at {}.",
        config.mount_point.display()
    );

    let fuse = managed_fuse::ManagedFuse::new(&config);
    {
        let _session = fuse.spawn(&config, Arc::new(namespace), handle)?;
        info!("chirp-fs is running. Press Ctrl+C to stop.");

        wait_for_exit().await?;
    }
    Ok(())
}

pub fn spawn(config: app_config::Config) -> Result<(), std::io::Error> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    runtime.block_on(run(config, runtime.handle().clone()))
}
