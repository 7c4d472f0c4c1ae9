use intranet_application::query::Query;
use intranet_macros::Query;

#[derive(Query)]
struct GetAccount {
    #[allow(dead_code)]
    number: String,
}

#[derive(Query)]
#[query(name = "accounts.list")]
enum ListAccounts {
    #[allow(dead_code)]
    All,
    #[allow(dead_code)]
    ByGroup(u32),
}

fn main() {
    assert_eq!(GetAccount::NAME, "GetAccount");
    assert_eq!(ListAccounts::NAME, "accounts.list");
}
