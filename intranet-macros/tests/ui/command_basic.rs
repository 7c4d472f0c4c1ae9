use intranet_application::command::Command;
use intranet_macros::Command;

#[derive(Command)]
struct CloseAccount {
    #[allow(dead_code)]
    number: String,
}

#[derive(Command)]
#[command(name = "finansstyring.CreateBookkeepingLine")]
struct CreateBookkeepingLine;

#[derive(Command)]
struct Batch<T: Send + Sync + 'static> {
    #[allow(dead_code)]
    items: Vec<T>,
}

fn main() {
    assert_eq!(CloseAccount::NAME, "CloseAccount");
    assert_eq!(
        CreateBookkeepingLine::NAME,
        "finansstyring.CreateBookkeepingLine"
    );
    assert_eq!(<Batch<u32> as Command>::NAME, "Batch");
}
