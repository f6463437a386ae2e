use std::sync::Arc;

use beanbag::{Bean, BeanDefinition, Container};
use log::info;
use parking_lot::Mutex;

#[derive(Bean)]
pub struct HelloWorldMessage {
    #[inject(config = "greeting.text")]
    text: String,
}

impl HelloWorldMessage {
    fn greet(&self) {
        println!("{}", self.text);
    }
}

/// Constructor injection of the message, setter injection of the hungry greeter.
#[derive(Bean)]
pub struct Greeter {
    #[inject(bean)]
    message: Arc<HelloWorldMessage>,
    #[inject(setter, named = "hungry_greeter")]
    hungry_greeter: Option<Arc<HungryGreeter>>,
}

impl Greeter {
    fn greet(&self) {
        self.message.greet();
    }

    fn greet_hungry_greeter(&self) {
        println!("From Greeter -----");
        if let Some(hungry_greeter) = &self.hungry_greeter {
            hungry_greeter.greet();
        }
    }
}

pub struct HungryGreeter {
    bean_name: String,
}

impl HungryGreeter {
    fn greet(&self) {
        println!("Hello, I am hungry : from bean name: {}", self.bean_name);
    }
}

#[derive(Bean)]
#[bean(lazy)]
pub struct StringGreeter {
    #[inject(bean)]
    message: Arc<String>,
    #[inject(bean_name)]
    bean_name: String,
}

impl StringGreeter {
    fn greet(&self) {
        println!(
            "Greeting from StringGreeter with message: {} with bean name: {}",
            self.message, self.bean_name
        );
    }
}

#[derive(Bean, Default)]
pub struct SingletonGreeter {
    message: Mutex<String>,
}

#[derive(Bean, Default)]
#[bean(prototype)]
pub struct PrototypeGreeter {
    message: Mutex<String>,
}

pub trait MessageService: Send + Sync {
    fn send_message(&self);
}

#[derive(Bean)]
#[bean(primary, provides = "dyn MessageService")]
pub struct EmailService;

impl MessageService for EmailService {
    fn send_message(&self) {
        println!("Sending an email message");
    }
}

#[derive(Bean)]
#[bean(qualifier = "sms", provides = "dyn MessageService")]
pub struct SmsService;

impl MessageService for SmsService {
    fn send_message(&self) {
        println!("Sending an SMS message");
    }
}

#[derive(Bean)]
pub struct NotificationService {
    #[inject(bean)]
    message_service: Arc<dyn MessageService>,
    #[inject(qualifier = "sms")]
    sms_service: Arc<dyn MessageService>,
}

impl NotificationService {
    fn print_message(&self) {
        self.message_service.send_message();
        self.sms_service.send_message();
    }
}

pub trait Task: Send + Sync {
    fn run(&self);
}

#[derive(Bean)]
#[bean(lazy, order = 2, depends_on = "task_b", provides = "dyn Task")]
pub struct TaskA;

impl Task for TaskA {
    fn run(&self) {
        println!("Running Task A");
    }
}

#[derive(Bean)]
#[bean(lazy, order = 1, provides = "dyn Task")]
pub struct TaskB;

impl Task for TaskB {
    fn run(&self) {
        println!("Running Task B");
    }
}

#[derive(Bean)]
#[bean(lazy)]
pub struct OrderTest {
    #[inject(named)]
    task_a: Arc<dyn Task>,
    #[inject(named)]
    task_b: Arc<dyn Task>,
}

#[derive(Bean)]
#[bean(lazy)]
pub struct OrderTestCollection {
    #[inject(all)]
    tasks: Vec<Arc<dyn Task>>,
}

#[derive(Bean)]
#[bean(lazy, post_construct = "post_construct", pre_destroy = "pre_destroy")]
pub struct LifeCycleGreeter;

impl LifeCycleGreeter {
    fn post_construct(&mut self) -> beanbag::Result<()> {
        info!("post construct executed for LifeCycleGreeter -----");
        Ok(())
    }

    fn pre_destroy(&self) {
        info!("pre destroy executed for LifeCycleGreeter -----");
    }

    fn greet(&self) {
        println!("Greeting from LifeCycleGreeter -----");
    }
}

/// Beans defined by functions instead of derived from a struct.
fn function_beans() -> Vec<BeanDefinition> {
    vec![
        BeanDefinition::builder("hungry_greeter_example", |ctx| {
            info!("[hungry_greeter_example] factory called -----");
            Ok(HungryGreeter {
                bean_name: ctx.bean_name().to_string(),
            })
        })
        .lazy()
        .build(),
        BeanDefinition::builder("hungry_greeter", |ctx| {
            Ok(HungryGreeter {
                bean_name: ctx.bean_name().to_string(),
            })
        })
        .build(),
        BeanDefinition::from_instance("get_message", "hello from get_message".to_string()).build(),
        BeanDefinition::builder("get_string_greeter", |ctx| {
            Ok(StringGreeter {
                message: ctx.get_named::<String>("get_message")?,
                bean_name: ctx.bean_name().to_string(),
            })
        })
        .build(),
    ]
}

fn bean_registry(container: &Container) {
    println!("\n---------- BEAN REGISTRY ----------");
    let names = container.get_bean_definition_names();
    println!("Registered bean names: {names:?}");

    if let Some(definition) = container.get_bean_definition("hello_world_message") {
        println!("\nHelloWorldMessage bean definition: {definition}");
    }

    println!("\nAll bean definitions: ");
    for name in names {
        if let Some(definition) = container.get_bean_definition(name) {
            println!("{name}: {definition}");
        }
    }
}

fn main() -> anyhow::Result<()> {
    let mut definitions = beanbag::beans![
        HelloWorldMessage,
        Greeter,
        StringGreeter,
        SingletonGreeter,
        PrototypeGreeter,
        EmailService,
        SmsService,
        NotificationService,
        TaskA,
        TaskB,
        OrderTest,
        OrderTestCollection,
        LifeCycleGreeter,
    ];
    definitions.extend(function_beans());

    // `cargo run -p tutorial -- dev` picks app-dev.toml
    let profile = std::env::args().nth(1).unwrap_or_else(|| "prod".to_string());

    beanbag::log_init()?;
    let loader = beanbag::AppConfigLoader {
        dir: env!("CARGO_MANIFEST_DIR"),
        profile: &profile,
        ..Default::default()
    };
    let container = beanbag::run_app(loader, definitions)?;

    println!("\n-------- CONTAINER IS READY --------");
    let greeter = container.get_bean::<Greeter>()?;
    greeter.greet();

    bean_registry(&container);

    println!("\n---------- FUNCTION DEFINED BEANS ----------");
    println!("Before requesting hungry_greeter_example, it is lazy -----");
    let hungry_greeter = container.get_bean_named::<HungryGreeter>("hungry_greeter_example")?;
    hungry_greeter.greet();
    greeter.greet_hungry_greeter();

    println!("Before requesting string_greeter, it is lazy -----");
    container
        .get_bean_named::<StringGreeter>("string_greeter")?
        .greet();
    container
        .get_bean_named::<StringGreeter>("get_string_greeter")?
        .greet();

    println!("\n---------- SCOPES : SINGLETON AND PROTOTYPE ----------");
    let singleton_1 = container.get_bean::<SingletonGreeter>()?;
    *singleton_1.message.lock() = "This message is for singleton_1".to_string();
    let singleton_2 = container.get_bean::<SingletonGreeter>()?;
    *singleton_2.message.lock() = "This message is for singleton_2".to_string();
    println!("Message from singleton_1: {}", singleton_1.message.lock());
    println!("Message from singleton_2: {}", singleton_2.message.lock());

    let prototype_1 = container.get_bean::<PrototypeGreeter>()?;
    *prototype_1.message.lock() = "This message is for prototype_1".to_string();
    let prototype_2 = container.get_bean::<PrototypeGreeter>()?;
    *prototype_2.message.lock() = "This message is for prototype_2".to_string();
    println!("Message from prototype_1: {}", prototype_1.message.lock());
    println!("Message from prototype_2: {}", prototype_2.message.lock());

    println!("\n---------- AUTOWIRING EXAMPLES ----------");
    container.get_bean::<NotificationService>()?.print_message();

    println!("\n---------- ORDERING OF BEANS ----------");
    let order_test = container.get_bean::<OrderTest>()?;
    println!("Single instances ----------");
    order_test.task_a.run();
    order_test.task_b.run();
    println!("Collection of bean instances ----------");
    for task in container.get_bean::<OrderTestCollection>()?.tasks.iter() {
        task.run();
    }

    println!("\n---------- LIFE CYCLE OF BEANS ----------");
    container.get_bean::<LifeCycleGreeter>()?.greet();

    if let Ok(patcher) = container.get_bean_named::<beanbag::LogPatcher>("log_patcher") {
        info!("current log filter: {}", patcher.current()?);
    }

    container.shutdown();
    Ok(())
}
