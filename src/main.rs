//! educhain - reward issuance and two-party approval from the command line.

use clap::{Parser, Subcommand};
use educhain::activation::{ActivationError, ActivationWorkflow};
use educhain::identity::{AccountId, SecretSeed, StrKeyError};
use educhain::issuance::{parse_reward_amount, select_backend, BuildError, RewardIssuanceBuilder};
use educhain::ledger::{
    BalanceReader, GatewayError, HorizonGateway, InMemoryLedger, LedgerGateway, SignedPayload,
};
use educhain::queue::{
    Decision, DecisionError, EnqueueError, GrantError, GrantOutcome, MeritGrantQueue,
    PaymentMetadata, PaymentQueue,
};
use educhain::storage::{BeneficiaryRecord, RewardStore, StoreError};
use educhain::{Categorized, Config, ConfigError, ErrorCategory};
use std::process::ExitCode;
use std::sync::Arc;
use thiserror::Error;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser)]
#[command(name = "educhain", about = "Reward issuance and two-party approval")]
struct Cli {
    /// Log filter used when RUST_LOG is not set
    #[arg(long, default_value = "info", env = "EDUCHAIN_LOG_LEVEL")]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Generate a fresh account credential
    Keygen,
    /// Show an account's reward balance
    Balance { account: String },
    /// Fund an account on the ledger (the issuer when no account is given)
    Fund { account: Option<String> },
    /// Provision and verify a beneficiary account
    Activate {
        /// Beneficiary record to attach the account to
        beneficiary: String,
        /// Account credential (S...)
        #[arg(long, env = "EDUCHAIN_CREDENTIAL", hide_env_values = true)]
        credential: String,
    },
    /// Build an issuer-signed reward payment without broadcasting it
    BuildReward { destination: String, amount: String },
    /// Broadcast an approved payload
    Submit { payload: String },
    /// Run the full issue / approve / grant flow on an in-memory ledger
    Demo {
        #[arg(long, default_value = "10")]
        amount: String,
    },
}

#[derive(Error, Debug)]
enum CliError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Account(#[from] StrKeyError),
    #[error(transparent)]
    Gateway(#[from] GatewayError),
    #[error(transparent)]
    Build(#[from] BuildError),
    #[error(transparent)]
    Activation(#[from] ActivationError),
    #[error(transparent)]
    Enqueue(#[from] EnqueueError),
    #[error(transparent)]
    Decision(#[from] DecisionError),
    #[error(transparent)]
    Grant(#[from] GrantError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl Categorized for CliError {
    fn category(&self) -> ErrorCategory {
        match self {
            CliError::Config(e) => e.category(),
            CliError::Account(e) => e.category(),
            CliError::Gateway(e) => e.category(),
            CliError::Build(e) => e.category(),
            CliError::Activation(e) => e.category(),
            CliError::Enqueue(e) => e.category(),
            CliError::Decision(e) => e.category(),
            CliError::Grant(e) => e.category(),
            CliError::Store(e) => e.category(),
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    match run(cli.command).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error [{}]: {}", e.category(), e);
            if e.category() == ErrorCategory::IssuerNotFunded {
                eprintln!("hint: run `educhain fund` to create the issuer account");
            }
            ExitCode::FAILURE
        }
    }
}

fn horizon(config: &Config) -> Result<Arc<dyn LedgerGateway>, CliError> {
    Ok(Arc::new(HorizonGateway::new(
        &config.horizon_url,
        &config.friendbot_url,
    )?))
}

async fn run(command: Command) -> Result<(), CliError> {
    match command {
        Command::Keygen => {
            let seed = SecretSeed::generate();
            println!("public: {}", seed.account_id());
            println!("secret: {}", seed.expose());
            Ok(())
        }
        Command::Balance { account } => {
            let config = Config::from_env()?;
            let account = AccountId::parse(&account)?;
            let reader = BalanceReader::new(horizon(&config)?, config.reward_asset()?);
            let balance = reader.reward_balance(&account).await;
            println!("{} {}", balance, reader.asset().code());
            Ok(())
        }
        Command::Fund { account } => {
            let config = Config::from_env()?;
            let account = match account {
                Some(a) => AccountId::parse(&a)?,
                None => config.issuer()?,
            };
            let outcome = horizon(&config)?.fund_account(&account).await?;
            println!("{}: {:?}", account, outcome);
            Ok(())
        }
        Command::Activate {
            beneficiary,
            credential,
        } => {
            let config = Config::from_env()?;
            let store = Arc::new(RewardStore::open(&config.store_path)?);
            let workflow = ActivationWorkflow::new(
                horizon(&config)?,
                store.clone(),
                config.reward_asset()?,
                config.network(),
            )
            .with_retry_policy(config.retry_policy());
            let outcome = workflow.activate(&beneficiary, &credential).await?;
            store.flush()?;
            println!(
                "{} is {} after {} verification attempt(s)",
                outcome.public_id, outcome.state, outcome.attempts
            );
            Ok(())
        }
        Command::BuildReward {
            destination,
            amount,
        } => {
            let config = Config::from_env()?;
            let gateway = horizon(&config)?;
            let builder =
                RewardIssuanceBuilder::new(select_backend(&config, gateway.clone())?, gateway);
            let amount = parse_reward_amount(&amount)?;
            let payload = builder.build_reward_transaction(&destination, amount).await?;
            println!("{}", payload);
            Ok(())
        }
        Command::Submit { payload } => {
            let config = Config::from_env()?;
            let backend = select_backend(&config, horizon(&config)?)?;
            let receipt = backend.submit(&SignedPayload::new(payload)).await?;
            println!("submitted {} in ledger {}", receipt.hash, receipt.ledger);
            Ok(())
        }
        Command::Demo { amount } => demo(&amount).await,
    }
}

async fn demo(amount: &str) -> Result<(), CliError> {
    let amount = parse_reward_amount(amount)?;
    let issuer = SecretSeed::generate();
    let validator = SecretSeed::generate();
    let student = SecretSeed::generate();
    let student_id = student.account_id();

    let config = Config::new()
        .with_issuer_secret(issuer)
        .with_validator_public(validator.account_id());
    config.validate()?;
    let asset = config.reward_asset()?;
    let network = config.network();

    let ledger = Arc::new(InMemoryLedger::new(network.clone()));
    let gateway: Arc<dyn LedgerGateway> = ledger.clone();
    let store = Arc::new(RewardStore::temporary()?);
    store.put_beneficiary(&BeneficiaryRecord::new("S001", "Demo Student"))?;

    let activation =
        ActivationWorkflow::new(gateway.clone(), store.clone(), asset.clone(), network);
    let activated = activation.activate("S001", &student.expose()).await?;
    info!(account = %activated.public_id, "student activated");

    let backend = select_backend(&config, gateway.clone())?;
    let builder = RewardIssuanceBuilder::new(backend.clone(), gateway.clone());
    let beneficiary = student_id.to_string();

    let payload = match builder.build_reward_transaction(&beneficiary, amount).await {
        Ok(payload) => payload,
        Err(e) if e.category() == ErrorCategory::IssuerNotFunded => {
            println!("issuer not funded, funding {}", builder.issuer());
            builder.fund_issuer().await?;
            builder.build_reward_transaction(&beneficiary, amount).await?
        }
        Err(e) => return Err(e.into()),
    };

    let payments = PaymentQueue::new(backend, store.clone());
    let id = payments.enqueue(
        payload,
        PaymentMetadata::new("S001", student_id, amount, "Demo task"),
    )?;
    println!("{} pending validation", id);

    let decided = payments.decide(&id, Decision::Approve).await?;
    println!("{} -> {}", id, decided.status());

    let reader = BalanceReader::new(gateway, asset);
    for (account, balance) in reader.refresh(&payments.take_refresh_requests()).await {
        println!("{} balance: {} {}", account, balance, reader.asset().code());
    }

    let merits = MeritGrantQueue::from_config(&config, store.clone())?;
    let grant = merits.initiate("S001", "Top Contributor", "Finished every demo task")?;
    if let GrantOutcome::Granted { merit, .. } = merits
        .decide(&grant, Decision::Approve, &validator.account_id())
        .await?
    {
        println!("{} granted with {} signatures", merit.id(), merit.signers().len());
    }

    if let Some(record) = store.get_beneficiary("S001")? {
        for achievement in &record.achievements {
            println!("achievement: {} ({})", achievement.name, achievement.reference);
        }
    }
    Ok(())
}
