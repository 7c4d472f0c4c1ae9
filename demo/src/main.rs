use async_trait::async_trait;
use chrono::NaiveDate;
use intranet_application::dto::Dto;
use intranet_application::{
    AppContext, AppError, CommandBus, CommandHandler, CommandHandlerWithResult, FaultException,
    HandlerRegistry, InMemoryCommandBus, InMemoryQueryBus, InMemoryTransactionManager, QueryBus,
    QueryHandler, ServiceBoundary, UnitOfWork,
};
use intranet_domain::{BusinessContext, DomainError};
use intranet_macros::{Command, Query};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, fmt};
use uuid::Uuid;

#[derive(Debug, thiserror::Error)]
enum LedgerError {
    #[error("account {0} does not exist")]
    UnknownAccount(String),
    #[error("account {0} has {1} bookkeeping lines")]
    HasLines(String, usize),
}

#[derive(Clone, Debug, Serialize)]
struct BookkeepingLine {
    id: Uuid,
    date: NaiveDate,
    text: String,
    amount: i64,
}

#[derive(Clone, Debug)]
struct Account {
    name: String,
    archived: bool,
    lines: Vec<BookkeepingLine>,
}

/// 内存账簿，代替 MySQL 仓储
#[derive(Clone, Default)]
struct Ledger {
    accounts: Arc<Mutex<HashMap<String, Account>>>,
}

impl Ledger {
    fn open(&self, number: &str, name: &str) {
        self.accounts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(
                number.to_string(),
                Account {
                    name: name.to_string(),
                    archived: false,
                    lines: Vec::new(),
                },
            );
    }

    fn with_account<T>(
        &self,
        number: &str,
        f: impl FnOnce(&mut Account) -> Result<T, LedgerError>,
    ) -> Result<T, DomainError> {
        let mut accounts = self.accounts.lock().unwrap_or_else(PoisonError::into_inner);
        let result = match accounts.get_mut(number) {
            Some(account) => f(account),
            None => Err(LedgerError::UnknownAccount(number.to_string())),
        };
        result.map_err(|err| DomainError::repository(err.to_string()).with_source(err))
    }

    fn remove(&self, number: &str) -> Result<(), DomainError> {
        self.with_account(number, |account| match account.lines.len() {
            0 => Ok(()),
            n => Err(LedgerError::HasLines(number.to_string(), n)),
        })?;
        self.accounts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(number);
        Ok(())
    }
}

#[derive(Command, Debug)]
struct CreateBookkeepingLine {
    account: String,
    date: NaiveDate,
    text: String,
    amount: i64,
}

#[derive(Command, Debug)]
struct DeleteAccount {
    number: String,
    archived: bool,
}

#[derive(Query, Debug)]
struct GetAccount {
    number: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
struct AccountView {
    number: String,
    name: String,
    archived: bool,
    balance: i64,
    lines: Vec<BookkeepingLine>,
}

impl Dto for AccountView {}

struct CreateBookkeepingLineHandler {
    ledger: Ledger,
}

#[async_trait]
impl CommandHandlerWithResult<CreateBookkeepingLine, Uuid> for CreateBookkeepingLineHandler {
    async fn handle(
        &self,
        _ctx: &AppContext,
        uow: &UnitOfWork,
        cmd: &CreateBookkeepingLine,
    ) -> Result<Uuid, AppError> {
        if cmd.amount == 0 {
            return Err(DomainError::business("amount must not be zero").into());
        }

        let id = Uuid::new_v4();
        self.ledger.with_account(&cmd.account, |account| {
            account.lines.push(BookkeepingLine {
                id,
                date: cmd.date,
                text: cmd.text.clone(),
                amount: cmd.amount,
            });
            Ok(())
        })?;
        info!(line = %id, transaction = ?uow.transaction_id(), "bookkeeping line created");
        Ok(id)
    }
}

/// 附加处理器：记账后写审计日志
struct AuditTrail {
    entries: Arc<Mutex<Vec<String>>>,
}

#[async_trait]
impl CommandHandler<CreateBookkeepingLine> for AuditTrail {
    async fn handle(
        &self,
        ctx: &AppContext,
        _uow: &UnitOfWork,
        cmd: &CreateBookkeepingLine,
    ) -> Result<(), AppError> {
        let actor = ctx.biz.actor_id().unwrap_or("anonymous");
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(format!("{actor} posted {} to {}", cmd.amount, cmd.account));
        Ok(())
    }
}

struct DeleteAccountHandler {
    ledger: Ledger,
}

#[async_trait]
impl CommandHandler<DeleteAccount> for DeleteAccountHandler {
    async fn handle(&self, _: &AppContext, _: &UnitOfWork, cmd: &DeleteAccount) -> Result<(), AppError> {
        self.ledger.remove(&cmd.number)?;
        Ok(())
    }

    /// 有记账行的账户不能删除，改为归档
    async fn handle_exception(&self, cmd: &mut DeleteAccount, error: AppError) -> Result<(), AppError> {
        warn!(account = %cmd.number, error = %error, "delete failed, archiving instead");
        self.ledger.with_account(&cmd.number, |account| {
            account.archived = true;
            Ok(())
        })?;
        cmd.archived = true;
        info!(account = %cmd.number, archived = cmd.archived, "account archived");
        Ok(())
    }
}

struct GetAccountHandler {
    ledger: Ledger,
}

#[async_trait]
impl QueryHandler<GetAccount, AccountView> for GetAccountHandler {
    async fn handle(&self, _: &AppContext, _: &UnitOfWork, q: GetAccount) -> Result<AccountView, AppError> {
        let view = self.ledger.with_account(&q.number, |account| {
            Ok(AccountView {
                number: q.number.clone(),
                name: account.name.clone(),
                archived: account.archived,
                balance: account.lines.iter().map(|l| l.amount).sum(),
                lines: account.lines.clone(),
            })
        })?;
        Ok(view)
    }
}

fn print_fault(fault: &FaultException) -> Result<(), serde_json::Error> {
    println!("fault: {}", serde_json::to_string_pretty(&fault.detail)?);
    Ok(())
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    if let Err(e) = fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .try_init()
    {
        warn!(error = %e, "tracing init failed");
    }

    let ledger = Ledger::default();
    ledger.open("1010", "Kasse");
    ledger.open("2010", "Bank");

    let audit = Arc::new(Mutex::new(Vec::new()));
    let registry = Arc::new(HandlerRegistry::new());
    registry.register_command_with_result::<CreateBookkeepingLine, Uuid, _>(Arc::new(
        CreateBookkeepingLineHandler {
            ledger: ledger.clone(),
        },
    ))?;
    registry.register_command::<CreateBookkeepingLine, _>(Arc::new(AuditTrail {
        entries: audit.clone(),
    }));
    registry.register_command::<DeleteAccount, _>(Arc::new(DeleteAccountHandler {
        ledger: ledger.clone(),
    }));
    registry.register_query::<GetAccount, AccountView, _>(Arc::new(GetAccountHandler {
        ledger: ledger.clone(),
    }))?;

    let tm = InMemoryTransactionManager::new();
    let commands = InMemoryCommandBus::new(registry.clone(), Arc::new(tm.clone()));
    let queries = InMemoryQueryBus::new(registry, Arc::new(tm.clone()));
    let service = ServiceBoundary::new("FinansstyringService")?;

    let biz = BusinessContext::builder()
        .correlation_id(Uuid::new_v4().to_string())
        .actor_id("bogholder".to_string())
        .build();
    let base = AppContext::new(biz);
    let date = NaiveDate::from_ymd_opt(2026, 10, 1).ok_or("invalid date")?;

    // 记账
    let ctx = service.context(base.clone(), "CreateBookkeepingLine");
    match service
        .invoke(
            "CreateBookkeepingLine",
            commands.publish_with_result::<_, Uuid>(
                &ctx,
                CreateBookkeepingLine {
                    account: "1010".into(),
                    date,
                    text: "Kontantsalg".into(),
                    amount: 1250,
                },
            ),
        )
        .await
    {
        Ok(id) => println!("created bookkeeping line {id}"),
        Err(fault) => print_fault(&fault)?,
    }

    // 记账到不存在的账户：仓储故障
    let ctx = service.context(base.clone(), "CreateBookkeepingLine");
    if let Err(fault) = service
        .invoke(
            "CreateBookkeepingLine",
            commands.publish_with_result::<_, Uuid>(
                &ctx,
                CreateBookkeepingLine {
                    account: "9999".into(),
                    date,
                    text: "Ukendt konto".into(),
                    amount: 10,
                },
            ),
        )
        .await
    {
        print_fault(&fault)?;
    }

    // 删除有记账行的账户：处理器改为归档
    let ctx = service.context(base.clone(), "DeleteAccount");
    match service
        .invoke(
            "DeleteAccount",
            commands.publish(
                &ctx,
                DeleteAccount {
                    number: "1010".into(),
                    archived: false,
                },
            ),
        )
        .await
    {
        Ok(()) => println!("delete of 1010 handled"),
        Err(fault) => print_fault(&fault)?,
    }

    let ctx = service.context(base.clone(), "GetAccount");
    match service
        .invoke(
            "GetAccount",
            queries.query::<_, AccountView>(
                &ctx,
                GetAccount {
                    number: "1010".into(),
                },
            ),
        )
        .await
    {
        Ok(view) => println!("account: {}", serde_json::to_string_pretty(&view)?),
        Err(fault) => print_fault(&fault)?,
    }

    println!("audit: {:?}", audit.lock().unwrap_or_else(PoisonError::into_inner));
    println!(
        "transactions: begun={}, committed={}, rolled back={}",
        tm.begun(),
        tm.committed(),
        tm.rolled_back()
    );
    Ok(())
}
