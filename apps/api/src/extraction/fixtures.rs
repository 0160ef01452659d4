//! Shared documents for extractor and engine tests.

use std::sync::Arc;

use once_cell::sync::Lazy;

use crate::extraction::taxonomy::Taxonomy;

static TAXONOMY: Lazy<Arc<Taxonomy>> =
    Lazy::new(|| Arc::new(Taxonomy::builtin().expect("built-in taxonomy compiles")));

pub fn taxonomy() -> Arc<Taxonomy> {
    TAXONOMY.clone()
}

pub const RECRUITER_RESUME: &str = r#"
Jordan Avery
Senior Technical Recruiter

Summary
Recruiter with 8+ years of full-cycle recruiting and talent acquisition experience across technology and staffing firms. Partner closely with hiring managers to build talent pipelines, run structured interviews and close offers.

Experience
Senior Technical Recruiter | Brightpath Talent | 2019 - Present
- Owned 25+ open requisitions at a time, sourcing passive candidates with Boolean search and LinkedIn Recruiter.
- Ran phone screens and structured interviews; improved time-to-fill by 30%.
- Managed offer negotiation and onboarding handoff for 120 hires per year.
- Administered Greenhouse as our applicant tracking system and reported recruiting metrics to leadership.

Recruiter | Northwind Staffing | 2016 - 2019
- Full-cycle recruitment for 40 requisitions across sales and operations.
- Built diversity recruiting programs and employer branding campaigns.
- Partnered with HR on onboarding and employee relations questions.

Skills
Full-cycle recruiting, candidate sourcing, Boolean search, Greenhouse, Workday, LinkedIn Recruiter, stakeholder management, communication skills, Excel
"#;

pub const DRYWALL_JD: &str = r#"
Job Title: Drywall Framer
Company: Summit Build Co. (Commercial Construction)

About the role
We are hiring an experienced framer to join our commercial construction crew. You will frame walls and ceilings with metal studs, hang drywall, and keep the jobsite clean and safe.

Responsibilities
- Layout and install metal stud framing per construction drawings.
- Hang, tape and finish drywall on commercial projects.
- Operate power tools, lifts and scaffolding safely.
- Follow site safety rules and building codes.

Requirements
- 3+ years of drywall and framing experience required.
- Must be able to read blueprints.
- OSHA 10 certification required.
- Valid driver's license required.
- Ability to lift 50 lbs.
"#;

pub const BENEFITS_JD: &str = r#"
Job Title: Benefits Administrator
Department: Human Resources

About the role
Our people team is looking for a Benefits Administrator to run day-to-day benefits administration for 1,200 employees. You will partner with carriers and brokers, answer employee benefit questions and keep plan administration compliant.

Responsibilities
- Manage open enrollment, COBRA and FMLA leave administration.
- Process eligibility changes in Workday and reconcile carrier invoices.
- Support onboarding of new hires and explain benefit plans.
- Partner with payroll on deductions and 401(k) contributions.

Requirements
- 3+ years of benefits administration experience.
- Working knowledge of ERISA, COBRA and FMLA.
- Experience with an HRIS such as Workday.
- Strong communication skills and attention to detail.
- Excel proficiency.
"#;

pub const RECRUITING_MANAGER_JD: &str = r#"
Job Title: Recruiting Manager
Team: Talent Acquisition

About the role
We are looking for a Recruiting Manager to lead full-cycle recruiting for our growing technology organization. You will partner with hiring managers, coach a team of recruiters and own our talent pipeline.

Responsibilities
- Own full-cycle recruiting for 20+ requisitions across engineering and sales.
- Source passive candidates using Boolean search and LinkedIn Recruiter.
- Run structured interviews and manage offer negotiation.
- Report recruiting metrics such as time-to-fill to leadership.

Requirements
- 5+ years of full-cycle recruiting or talent acquisition experience.
- Hands-on candidate sourcing and Boolean search skills.
- Experience administering Greenhouse or another applicant tracking system.
- Excellent stakeholder management and communication skills.
"#;

/// No taxonomy skill anywhere in it.
pub const VAGUE_JD: &str = r#"
Weekend helper wanted for our family-run shop. Friendly crew, flexible hours and weekly pay.
Come by any afternoon to say hello and learn more about joining us.
"#;
