use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::{format_ident, quote};
use syn::{parse_macro_input, spanned::Spanned, FnArg, Ident, ItemFn, Pat, Signature, Type};

/// Transform an asynchronous test into a synchronous one and inject
/// dependencies.
///
/// Each test gets a fresh server over a fresh store and a manual clock.
/// Injectable dependencies are [`rocket::local::asynchronous::Client`],
/// `crate::engine::Engine` and `crate::clock::ManualClock`.
///
/// With `#[backend_test(mongodb)]`, the store is a MongoDB database with a
/// random name, which is dropped however the test terminates, and
/// [`mongodb::Database`] can be injected too. These tests are ignored by
/// default since they need a running replica set; run them with
/// `cargo test -- --ignored` and `DB_URI` pointing at one.
#[proc_macro_attribute]
pub fn backend_test(args: TokenStream, input: TokenStream) -> TokenStream {
    let mut item_fn = parse_macro_input!(input as ItemFn);

    let use_mongodb = match parse_macro_input!(args as Option<Ident>) {
        None => false,
        Some(arg) if arg == "mongodb" => true,
        Some(arg) => {
            return syn::Error::new(arg.span(), "Expected no argument or `mongodb`")
                .into_compile_error()
                .into();
        }
    };

    // Extract type information and reject invalid function signatures.
    let test_args = match check_sig(item_fn.sig.clone(), use_mongodb) {
        Ok(args) => args,
        Err(err) => {
            return err.into_compile_error().into();
        }
    };

    // Rename the future so the test can have its original name.
    let name = item_fn.sig.ident.clone();
    let new_name = format_ident!("{}_fut", name);
    item_fn.sig.ident = new_name.clone();

    let (maybe_ignore, store_setup, cleanup) = if use_mongodb {
        (
            quote! { #[ignore = "requires a MongoDB replica set; set DB_URI"] },
            quote! {
                let db_name = format!("pollbooth_test_{:08x}", rand::random::<u32>());
                let store = crate::model::mongodb::MongoStore::connect(&crate::test_db_uri(), &db_name)
                    .await
                    .unwrap();
                let db = Some(store.database().clone());
                let store: std::sync::Arc<dyn crate::model::store::Store> = std::sync::Arc::new(store);
            },
            quote! {
                if let Some(db) = db {
                    db.drop(None).await.unwrap();
                }
            },
        )
    } else {
        (
            quote! {},
            quote! {
                let db: Option<mongodb::Database> = None;
                let store: std::sync::Arc<dyn crate::model::store::Store> =
                    std::sync::Arc::new(crate::model::store::MemoryStore::new());
            },
            quote! {
                drop(db);
            },
        )
    };

    // Rewrite the test function.
    quote! {
        #[test]
        #maybe_ignore
        fn #name() {
            /// Test setup.
            async fn setup() -> (
                rocket::local::asynchronous::Client,
                crate::engine::Engine,
                crate::clock::ManualClock,
                Option<mongodb::Database>,
            ) {
                #store_setup
                let clock = crate::clock::ManualClock::default();
                let engine = crate::engine::Engine::new(store, std::sync::Arc::new(clock.clone()));
                let rocket_client = rocket::local::asynchronous::Client::tracked(
                    crate::rocket_for_engine(crate::test_figment(), engine.clone()),
                )
                .await
                .unwrap();
                (rocket_client, engine, clock, db)
            }

            /// The test itself.
            #item_fn

            /// Test cleanup.
            async fn cleanup(db: Option<mongodb::Database>) {
                #cleanup
            }

            log4rs_test_utils::test_logging::init_logging_once_for(["pollbooth_backend"], None, None);

            let runtime = rocket::tokio::runtime::Builder::new_multi_thread()
                .thread_name("rocket-worker-test-thread")
                .worker_threads(4)
                .enable_all()
                .build()
                .unwrap();

            // Run the setup.
            #[allow(unused_variables)]
            let (rocket_client, engine, clock, db) = runtime.block_on(setup());

            // Run the test, catching any panics.
            let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
                runtime.block_on(#new_name(#(#test_args),*));
            }));

            // Run the cleanup.
            runtime.block_on(cleanup(db));

            // If the test panicked, re-raise the panic.
            if let Err(cause) = result {
                std::panic::resume_unwind(cause);
            }
        }
    }
    .into()
}

/// Ensure the wrapped test is async, extract parameters to inject, and reject unknown parameters.
fn check_sig(sig: Signature, use_mongodb: bool) -> Result<Vec<TokenStream2>, syn::Error> {
    if sig.asyncness.is_none() {
        return Err(syn::Error::new(sig.span(), "Test must be marked `async`"));
    }

    let mut seen: Vec<String> = vec![];
    let mut args = vec![];

    for input in &sig.inputs {
        if let FnArg::Typed(pat_type) = input {
            if let (Pat::Ident(_), Type::Path(type_path)) = (&*pat_type.pat, &*pat_type.ty) {
                // Valid as the last path segment for any type is itself
                let type_ident = &type_path.path.segments.last().unwrap().ident;
                let injected = if type_ident == "Client" {
                    Some(quote! { rocket_client })
                } else if type_ident == "Engine" {
                    Some(quote! { engine })
                } else if type_ident == "ManualClock" {
                    Some(quote! { clock })
                } else if type_ident == "Database" {
                    if !use_mongodb {
                        return Err(syn::Error::new(
                            input.span(),
                            "Only `#[backend_test(mongodb)]` tests can accept a `mongodb::Database`",
                        ));
                    }
                    Some(quote! { db.clone().unwrap() })
                } else {
                    None
                };

                if let Some(injected) = injected {
                    let type_name = type_ident.to_string();
                    if seen.contains(&type_name) {
                        return Err(syn::Error::new(
                            input.span(),
                            format!("Test cannot accept more than one `{type_name}`"),
                        ));
                    }
                    seen.push(type_name);
                    args.push(injected);
                    continue;
                }
            }
        }

        return Err(syn::Error::new(
            input.span(),
            "Expected one of `client: Client`, `engine: Engine`, `clock: ManualClock` or `db: Database`",
        ));
    }

    Ok(args)
}
