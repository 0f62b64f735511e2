use keel::{
    Environment,
    Host,
    HostedService,
    HostedServiceExt,
    di::{Close, ServiceDescriptor, ServiceLifetime, ServiceProvider, error::Error as DiError},
    error::{BoxError, Error},
};
use parking_lot::Mutex;
use std::{
    sync::{Arc, atomic::{AtomicBool, Ordering}},
    time::Duration,
};

type Journal = Arc<Mutex<Vec<String>>>;

struct Ordered {
    name: &'static str,
    order: i32,
    journal: Journal,
}

struct One(Ordered);
struct Two(Ordered);

macro_rules! hosted {
    ($($ty:ident),*) => {
        $(impl HostedService for $ty {
            fn start(&self) -> Result<(), BoxError> {
                self.0.journal.lock().push(format!("start {}", self.0.name));
                Ok(())
            }

            fn stop(&self) -> Result<(), BoxError> {
                self.0.journal.lock().push(format!("stop {}", self.0.name));
                Ok(())
            }

            fn order(&self) -> i32 {
                self.0.order
            }

            fn name(&self) -> &'static str {
                self.0.name
            }
        })*
    };
}

hosted!(One, Two);

struct Failing(&'static str);
struct AlsoFailing(&'static str);

macro_rules! failing {
    ($($ty:ident),*) => {
        $(impl HostedService for $ty {
            fn start(&self) -> Result<(), BoxError> {
                Ok(())
            }

            fn stop(&self) -> Result<(), BoxError> {
                Err(format!("{} refused to stop", self.0).into())
            }

            fn name(&self) -> &'static str {
                self.0
            }
        })*
    };
}

failing!(Failing, AlsoFailing);

/// Records that the root provider closed it
#[derive(Default)]
struct Sentinel {
    closed: Arc<AtomicBool>,
}

impl Close for Sentinel {
    fn close(&self) -> Result<(), BoxError> {
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}

/// Stops the host from inside once started
struct SelfStopping {
    environment: Arc<Environment>,
}

impl HostedService for SelfStopping {
    fn start(&self) -> Result<(), BoxError> {
        self.environment.stop();
        Ok(())
    }

    fn stop(&self) -> Result<(), BoxError> {
        Ok(())
    }
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn ordered(journal: &Journal) -> Host {
    Host::builder()
        .configure_services(|services| {
            services
                .add_hosted_instance(One(Ordered { name: "1", order: 1, journal: journal.clone() }))?
                .add_hosted_instance(Two(Ordered { name: "2", order: 2, journal: journal.clone() }))?;
            Ok(())
        })
        .unwrap()
        .build()
        .unwrap()
}

fn sentinel(closed: &Arc<AtomicBool>) -> ServiceDescriptor {
    ServiceDescriptor::instance::<Sentinel, Sentinel>(Sentinel { closed: closed.clone() })
        .with_close::<Sentinel>()
}

#[test]
fn it_starts_in_order_and_stops_in_reverse() {
    let journal = Journal::default();
    let host = ordered(&journal);

    host.start().unwrap();
    host.stop().unwrap();

    assert_eq!(*journal.lock(), vec!["start 1", "start 2", "stop 2", "stop 1"]);
}

#[test]
fn it_returns_from_run_after_stop_signal_and_closes_provider() {
    init_tracing();
    let journal = Journal::default();
    let closed = Arc::new(AtomicBool::new(false));
    let host = Host::builder()
        .configure_services(|services| {
            services
                .add(sentinel(&closed))?
                .add_hosted_instance(One(Ordered { name: "worker", order: 0, journal: journal.clone() }))?;
            Ok(())
        })
        .unwrap()
        .build()
        .unwrap();

    let runner = {
        let host = host.clone();
        std::thread::spawn(move || host.run())
    };
    while journal.lock().is_empty() {
        std::thread::sleep(Duration::from_millis(1));
    }
    host.environment().stop();

    runner.join().unwrap().unwrap();

    assert!(closed.load(Ordering::SeqCst));
    assert!(host.service_provider().is_closed());
    assert_eq!(*journal.lock(), vec!["start worker", "stop worker"]);
}

#[test]
fn it_runs_until_hosted_service_requests_stop() {
    let host = Host::builder()
        .configure_services(|services| {
            services.add_hosted_factory(|environment: Arc<Environment>| {
                Ok(SelfStopping { environment })
            })?;
            Ok(())
        })
        .unwrap()
        .build()
        .unwrap();

    host.run().unwrap();

    assert!(host.environment().is_stop_requested());
}

#[test]
fn it_runs_hooks_around_every_phase() {
    let journal = Journal::default();
    let hooks = journal.clone();
    let host = Host::builder()
        .configure_environment(move |env| {
            for phase in ["starting", "started", "stopping", "stopped"] {
                let journal = hooks.clone();
                let hook = move || -> Result<(), BoxError> {
                    journal.lock().push(phase.to_string());
                    Ok(())
                };
                match phase {
                    "starting" => env.add_starting_hook(hook),
                    "started" => env.add_started_hook(hook),
                    "stopping" => env.add_stopping_hook(hook),
                    _ => env.add_stopped_hook(hook),
                };
            }
        })
        .configure_services(|services| {
            services.add_hosted_instance(One(Ordered { name: "1", order: 0, journal: journal.clone() }))?;
            Ok(())
        })
        .unwrap()
        .build()
        .unwrap();

    host.start().unwrap();
    host.stop().unwrap();

    assert_eq!(
        *journal.lock(),
        vec!["starting", "start 1", "started", "stopping", "stop 1", "stopped"]
    );
}

#[test]
fn it_keeps_going_when_hooks_fail() {
    init_tracing();
    let journal = Journal::default();
    let late = journal.clone();
    let host = Host::builder()
        .configure_environment(move |env| {
            env.add_starting_hook(|| Err("hook failed".into()));
            env.add_starting_hook(move || {
                late.lock().push("late hook".into());
                Ok(())
            });
        })
        .configure_services(|services| {
            services.add_hosted_instance(One(Ordered { name: "1", order: 0, journal: journal.clone() }))?;
            Ok(())
        })
        .unwrap()
        .build()
        .unwrap();

    host.start().unwrap();

    assert_eq!(*journal.lock(), vec!["late hook", "start 1"]);
}

#[test]
fn it_reports_every_stop_failure() {
    init_tracing();
    let journal = Journal::default();
    let host = Host::builder()
        .configure_services(|services| {
            services
                .add_hosted_instance(Failing("first"))?
                .add_hosted_instance(One(Ordered { name: "healthy", order: 0, journal: journal.clone() }))?
                .add_hosted_instance(AlsoFailing("second"))?;
            Ok(())
        })
        .unwrap()
        .build()
        .unwrap();

    let err = host.stop().unwrap_err();

    let names = err.stop_failures().iter().map(|f| f.service).collect::<Vec<_>>();
    assert_eq!(names, vec!["second", "first"]);
    assert_eq!(*journal.lock(), vec!["stop healthy"]);
    assert!(err.to_string().contains("first refused to stop"));
    assert!(err.to_string().contains("second refused to stop"));
}

#[test]
fn it_resolves_environment_in_services() {
    let host = Host::builder()
        .configure_environment(|env| {
            env.set_environment_name("Staging");
        })
        .configure_services(|services| {
            services.add_singleton_factory(|env: Arc<Environment>| Ok(env.environment_name()))?;
            Ok(())
        })
        .unwrap()
        .build()
        .unwrap();

    let name = host.service_provider().get_required_service::<String>().unwrap();

    assert_eq!(name.as_str(), "Staging");
}

#[test]
fn it_closes_scoped_resources_with_scope() {
    let closed = Arc::new(AtomicBool::new(false));
    let flag = closed.clone();
    let host = Host::builder()
        .configure_services(move |services| {
            services.add(
                ServiceDescriptor::factory::<Sentinel, Sentinel, _, _>(
                    ServiceLifetime::Scoped,
                    move || Ok(Sentinel { closed: flag.clone() }),
                )
                .with_close::<Sentinel>(),
            )?;
            Ok(())
        })
        .unwrap()
        .build()
        .unwrap();

    {
        let scope = host.service_provider().create_scope();
        scope.get_required_service::<Sentinel>().unwrap();
    }

    assert!(closed.load(Ordering::SeqCst));
    assert!(!host.service_provider().is_closed());
}

#[tokio::test]
async fn it_runs_async_until_stopped() {
    let journal = Journal::default();
    let closed = Arc::new(AtomicBool::new(false));
    let host = Host::builder()
        .configure_services(|services| {
            services
                .add(sentinel(&closed))?
                .add_hosted_instance(One(Ordered { name: "1", order: 0, journal: journal.clone() }))?;
            Ok(())
        })
        .unwrap()
        .build()
        .unwrap();

    let task = host.run_async().unwrap();
    assert_eq!(*journal.lock(), vec!["start 1"]);

    host.environment().stop();
    host.shutdown_requested().await;
    task.await.unwrap();

    assert_eq!(*journal.lock(), vec!["start 1", "stop 1"]);
    assert!(closed.load(Ordering::SeqCst));
}

#[tokio::test]
async fn it_stops_on_signal_and_waits_for_run_loop() {
    init_tracing();
    let journal = Journal::default();
    let host = ordered(&journal);
    let (tx, rx) = tokio::sync::oneshot::channel::<()>();

    let stopper = host.stop_on(rx).unwrap();
    let runner = {
        let host = host.clone();
        tokio::task::spawn_blocking(move || host.run())
    };

    tx.send(()).unwrap();
    stopper.await.unwrap();

    assert!(host.service_provider().is_closed());
    runner.await.unwrap().unwrap();
    assert_eq!(
        *journal.lock(),
        vec!["start 1", "start 2", "stop 2", "stop 1"]
    );
}

#[test]
fn it_fails_start_when_hosted_service_cannot_be_created() {
    let host = Host::builder()
        .configure_services(|services| {
            services.add_hosted_factory(|_: ServiceProvider| -> Result<One, DiError> {
                Err(DiError::other("no journal"))
            })?;
            Ok(())
        })
        .unwrap()
        .build()
        .unwrap();

    let err = host.start().unwrap_err();

    assert!(matches!(err, Error::Services(_)));
    assert!(err.to_string().contains("no journal"));
}
